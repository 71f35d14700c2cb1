use std::io::{self, BufRead};

/// RFC 4180 record reader.
///
/// Handles quoted fields (embedded delimiters, newlines and `""`), a
/// configurable delimiter, and CRLF or LF line endings.
pub struct CsvReader {
    delimiter: char,
}

impl CsvReader {
    pub fn new(delimiter: char) -> Self {
        CsvReader { delimiter }
    }

    pub fn comma() -> Self {
        Self::new(',')
    }

    pub fn tab() -> Self {
        Self::new('\t')
    }

    /// Read the next record's fields, or `None` at end of input.
    pub fn next_record(&self, reader: &mut dyn BufRead) -> io::Result<Option<Vec<String>>> {
        let mut raw = String::new();
        if reader.read_line(&mut raw)? == 0 {
            return Ok(None);
        }

        // An open quote means the record continues on the next line.
        while !quotes_balanced(&raw) {
            let mut cont = String::new();
            if reader.read_line(&mut cont)? == 0 {
                break;
            }
            raw.push_str(&cont);
        }

        if raw.ends_with('\n') {
            raw.pop();
            if raw.ends_with('\r') {
                raw.pop();
            }
        }
        Ok(Some(parse_fields(&raw, self.delimiter)))
    }
}

fn quotes_balanced(s: &str) -> bool {
    // A doubled quote toggles twice, so counting is enough.
    s.chars().filter(|&c| c == '"').count() % 2 == 0
}

/// Split one logical record, honouring quotes.
fn parse_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            _ if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
