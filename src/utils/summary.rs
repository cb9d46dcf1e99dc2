use indexmap::IndexMap;
use thousands::Separable;

const VALUE_WIDTH: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Int(u64),
    Float(f64),
}

///////////////////////////////
/// Ordered set of named counters, printed as a table once a command has finished
#[derive(Debug, Clone)]
pub struct Summary {
    name: String,
    entries: IndexMap<String, StatValue>,
}

impl Summary {
    pub fn new(name: &str) -> Summary {
        Summary {
            name: name.to_string(),
            entries: IndexMap::new(),
        }
    }

    pub fn add(&mut self, key: &str, n: u64) {
        match self.entries.entry(key.to_string()).or_insert(StatValue::Int(0)) {
            StatValue::Int(v) => *v += n,
            StatValue::Float(v) => *v += n as f64,
        }
    }

    pub fn set(&mut self, key: &str, n: u64) {
        self.entries.insert(key.to_string(), StatValue::Int(n));
    }

    pub fn set_float(&mut self, key: &str, v: f64) {
        self.entries.insert(key.to_string(), StatValue::Float(v));
    }

    ///////////////////////////////
    /// Store part/total as a percentage, if total is non-zero
    pub fn set_percentage(&mut self, key: &str, part: u64, total: u64) {
        if total > 0 {
            self.set_float(key, 100.0 * part as f64 / total as f64);
        }
    }

    pub fn get(&self, key: &str) -> Option<StatValue> {
        self.entries.get(key).copied()
    }

    pub fn get_int(&self, key: &str) -> u64 {
        match self.entries.get(key) {
            Some(StatValue::Int(v)) => *v,
            Some(StatValue::Float(v)) => *v as u64,
            None => 0,
        }
    }

    pub fn format_stats(&self) -> String {
        let name_width = self.entries.keys().map(|k| k.len()).max().unwrap_or(10);
        let width = VALUE_WIDTH + name_width + 1;

        let mut out = String::new();
        out.push_str(&"=".repeat(width));
        out.push('\n');
        out.push_str(&format!("STATS SUMMARY - {}\n", self.name));
        out.push_str(&"-".repeat(width));
        out.push('\n');
        for (key, value) in &self.entries {
            let value_str = match value {
                StatValue::Int(v) => {
                    format!("{:>w$}", v.separate_with_commas(), w = VALUE_WIDTH)
                }
                StatValue::Float(v) => format!(
                    "{:>w$}",
                    format!("{:.3}", v).separate_with_commas(),
                    w = VALUE_WIDTH + 4
                ),
            };
            out.push_str(&format!("{:<w$} {}\n", key, value_str, w = name_width));
        }
        out.push_str(&"=".repeat(width));
        out.push('\n');
        out
    }

    pub fn print_stats(&self) {
        eprint!("{}", self.format_stats());
    }
}
