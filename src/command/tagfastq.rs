use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;
use rustc_hash::FxHashMap;

use crate::fileformat::{
    verify_input_file, FastxFormat, FastxReader, FastxWriter, RecordSink, SequenceRecord,
};
use crate::utils::{log_progress, Summary};

pub const DEFAULT_SEPARATOR: &str = "_";
pub const DEFAULT_ANNOTATION_LOOKAHEAD: usize = 124;

#[derive(Args)]
pub struct TagFastqCMD {
    #[arg(value_parser)]
    /// FASTQ/FASTA to annotate
    pub path_in: PathBuf,

    #[arg(value_parser)]
    /// FASTQ/FASTA whose sequences are used as annotation, matched by read id
    pub path_annotation: PathBuf,

    #[arg(short = 'o', long = "output", value_parser, default_value = "-")]
    /// Output file. Same format as the input unless the file name says otherwise
    pub path_out: PathBuf,

    #[arg(short = 's', long = "separator", value_parser, default_value = DEFAULT_SEPARATOR)]
    /// Separator between read id and annotation
    pub separator: String,

    #[arg(long = "sort", value_parser, default_value = "false")]
    /// Write reads grouped by annotation. Holds all annotated reads in memory
    pub sort: bool,
}
impl TagFastqCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let summary = TagFastq::run(&TagFastq {
            path_in: self.path_in.clone(),
            path_annotation: self.path_annotation.clone(),
            path_out: self.path_out.clone(),
            separator: self.separator.clone(),
            sort: self.sort,
        })?;

        summary.print_stats();
        log::info!("TagFastq has finished succesfully");
        Ok(())
    }
}

///////////////////////////////
/// Lookup of annotation reads by id, for a file in roughly the same order as the reads being
/// annotated. Reads up to `lookahead` records ahead, keeping the ones passed over
pub struct BufferedAnnotationReader<I> {
    reads: I,
    buffer: FxHashMap<String, SequenceRecord>,
    lookahead: usize,
}

impl<I> BufferedAnnotationReader<I>
where
    I: Iterator<Item = Result<SequenceRecord>>,
{
    pub fn new(reads: I, lookahead: usize) -> BufferedAnnotationReader<I> {
        BufferedAnnotationReader {
            reads,
            buffer: FxHashMap::default(),
            lookahead,
        }
    }

    pub fn get(&mut self, id: &str) -> Result<Option<SequenceRecord>> {
        if let Some(rec) = self.buffer.remove(id) {
            return Ok(Some(rec));
        }

        for _ in 0..self.lookahead {
            let rec = match self.reads.next() {
                Some(rec) => rec?,
                None => break,
            };
            if rec.id() == id {
                //The files are in sync again; anything passed over is not coming back
                self.buffer.clear();
                return Ok(Some(rec));
            }
            self.buffer.insert(rec.id().to_string(), rec);
        }
        Ok(None)
    }
}

pub struct TagFastq {
    pub path_in: PathBuf,
    pub path_annotation: PathBuf,
    pub path_out: PathBuf,
    pub separator: String,
    pub sort: bool,
}
impl TagFastq {
    /// Run the algorithm
    pub fn run(params: &TagFastq) -> Result<Summary> {
        verify_input_file(&params.path_in)?;
        verify_input_file(&params.path_annotation)?;

        let reader = FastxReader::open(&params.path_in)?;
        let input_format = reader.format().unwrap_or(FastxFormat::Fasta);
        info!("Input file format: {:?}", input_format);

        let annotation = FastxReader::open(&params.path_annotation)?;
        let mut annotation = BufferedAnnotationReader::new(annotation, DEFAULT_ANNOTATION_LOOKAHEAD);

        let mut writer = FastxWriter::create_or(&params.path_out, input_format)?;
        info!("Output file format: {:?}", writer.format());

        let mut summary = Summary::new("tagfastq");
        if params.sort {
            let mut tagged = Vec::new();
            tag_reads(reader, &mut annotation, &params.separator, &mut summary, &mut tagged)?;

            info!("Sorting {} annotated reads", tagged.len());
            tagged.sort_by(|a, b| a.tag(&params.separator).cmp(&b.tag(&params.separator)));
            for rec in &tagged {
                writer.write_record(rec)?;
            }
        } else {
            tag_reads(reader, &mut annotation, &params.separator, &mut summary, &mut writer)?;
        }
        writer.commit()?;

        summary.set_percentage(
            "Reads annotated (%)",
            summary.get_int("Reads annotated"),
            summary.get_int("Reads total"),
        );
        Ok(summary)
    }
}

///////////////////////////////
/// Append the annotation sequence to the id of every read that has one; drop the rest
pub fn tag_reads<R, I, S>(
    reads: R,
    annotation: &mut BufferedAnnotationReader<I>,
    separator: &str,
    summary: &mut Summary,
    sink: &mut S,
) -> Result<()>
where
    R: IntoIterator<Item = Result<SequenceRecord>>,
    I: Iterator<Item = Result<SequenceRecord>>,
    S: RecordSink,
{
    summary.set("Reads total", 0);
    summary.set("Reads annotated", 0);

    let mut num_reads = 0;
    for rec in reads {
        let mut rec = rec?;
        num_reads += 1;
        log_progress("reads", num_reads);
        summary.add("Reads total", 1);

        if let Some(annot) = annotation.get(rec.id())? {
            let tag = String::from_utf8_lossy(&annot.sequence).into_owned();
            rec.append_tag(separator, &tag);
            sink.write_record(&rec)?;
            summary.add("Reads annotated", 1);
        }
    }
    Ok(())
}
