///////////////////////////////
/// One FASTA/FASTQ read. The name is the full header line without the leading > or @
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: Vec<u8>,
    pub quality: Option<Vec<u8>>,
}
impl SequenceRecord {
    pub fn new(name: &str, sequence: &[u8], quality: Option<&[u8]>) -> SequenceRecord {
        SequenceRecord {
            name: name.to_string(),
            sequence: sequence.to_vec(),
            quality: quality.map(|q| q.to_vec()),
        }
    }

    ///////////////////////////////
    /// Read id, i.e. the first whitespace-delimited token of the name
    pub fn id(&self) -> &str {
        split_name(&self.name).0
    }

    ///////////////////////////////
    /// Anything after the id, e.g. "1:N:0:GACGAGATTA"
    pub fn comment(&self) -> Option<&str> {
        split_name(&self.name).1
    }

    ///////////////////////////////
    /// Tag stored at the end of the id, after the last separator
    pub fn tag(&self, separator: &str) -> Option<&str> {
        parse_tag(self.id(), separator)
    }

    ///////////////////////////////
    /// Append a tag to the id, keeping any comment after it
    pub fn append_tag(&mut self, separator: &str, tag: &str) {
        let name = match self.comment() {
            Some(comment) => format!("{}{}{} {}", self.id(), separator, tag, comment),
            None => format!("{}{}{}", self.id(), separator, tag),
        };
        self.name = name;
    }

    ///////////////////////////////
    /// Swap in a new sequence. Quality is truncated, or padded with its last value, to the new length
    pub fn replace_sequence(&mut self, sequence: &[u8]) {
        if let Some(quality) = &mut self.quality {
            let pad = quality.last().copied().unwrap_or(b'I');
            quality.resize(sequence.len(), pad);
        }
        self.sequence.clear();
        self.sequence.extend_from_slice(sequence);
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once(|c: char| c.is_ascii_whitespace()) {
        Some((id, rest)) => {
            let rest = rest.trim();
            if rest.is_empty() {
                (id, None)
            } else {
                (id, Some(rest))
            }
        }
        None => (name, None),
    }
}

///////////////////////////////
/// Get the tag from an id of the form <id><separator><tag>
pub fn parse_tag<'a>(id: &'a str, separator: &str) -> Option<&'a str> {
    if separator.is_empty() {
        return None;
    }
    match id.rsplit_once(separator) {
        Some((_, tag)) if !tag.is_empty() => Some(tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_and_comment() {
        let rec = SequenceRecord::new("M03699:250:1102:5914:5953 1:N:0:GACG", b"ACGT", None);
        assert_eq!(rec.id(), "M03699:250:1102:5914:5953");
        assert_eq!(rec.comment(), Some("1:N:0:GACG"));

        let rec = SequenceRecord::new("read1", b"ACGT", None);
        assert_eq!(rec.id(), "read1");
        assert_eq!(rec.comment(), None);
    }

    #[test]
    fn test_append_and_parse_tag() {
        let mut rec = SequenceRecord::new("read1 extra", b"ACGT", Some(b"IIII"));
        rec.append_tag("_", "AACCGGTT");
        assert_eq!(rec.name, "read1_AACCGGTT extra");
        assert_eq!(rec.tag("_"), Some("AACCGGTT"));

        //Only the last separator counts
        let rec = SequenceRecord::new("read_1_GGGG", b"ACGT", None);
        assert_eq!(rec.tag("_"), Some("GGGG"));

        let rec = SequenceRecord::new("read1", b"ACGT", None);
        assert_eq!(rec.tag("_"), None);
        assert_eq!(parse_tag("read1_", "_"), None);
    }

    #[test]
    fn test_replace_sequence() {
        let mut rec = SequenceRecord::new("r", b"AAAT", Some(b"IIII"));
        rec.replace_sequence(b"AAAA");
        assert_eq!(rec.sequence, b"AAAA".to_vec());
        assert_eq!(rec.quality, Some(b"IIII".to_vec()));

        let mut rec = SequenceRecord::new("r", b"AAAT", Some(b"IIIF"));
        rec.replace_sequence(b"AAAAAA");
        assert_eq!(rec.quality, Some(b"IIIFFF".to_vec()));

        rec.replace_sequence(b"AAA");
        assert_eq!(rec.quality, Some(b"III".to_vec()));

        let mut rec = SequenceRecord::new("r", b"AAAT", None);
        rec.replace_sequence(b"AAAAA");
        assert_eq!(rec.quality, None);
    }
}
