//! Keyword `:=` value parameter blocks
//!
//! ```text
//! Kinetic Model type := Patlak Plot
//! Patlak Plot Parameters:=
//! time frame definition filename := frames.txt
//! starting frame := 23
//! ; In seconds
//! Time Shift := 0
//! end Patlak Plot Parameters:=
//! ```
//!
//! Keys are matched case-insensitively with runs of whitespace collapsed, so
//! `Time Shift` and `time  shift` are the same key. A `;` at the start of a
//! line or after whitespace starts a comment; `plasma;v2.txt` is a value.

use std::fmt;

use crate::KineticError;

/// Parsed entries of one parameter block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMap {
    name: Option<String>,
    entries: Vec<(String, String)>,
}

/// Lower-case `key` and collapse internal whitespace
pub fn normalise_key(key: &str) -> String {
    key.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut a `;` comment that starts the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    let comment = line.char_indices().find(|&(i, c)| {
        c == ';' && line[..i].chars().next_back().map_or(true, char::is_whitespace)
    });
    match comment {
        Some((i, _)) => &line[..i],
        None => line,
    }
}

impl KeyMap {
    /// Parse a parameter block
    ///
    /// Entries before the `<Name> Parameters:=` header and after the matching
    /// `End <Name> Parameters:=` line are ignored, except for `Kinetic Model
    /// type`, which names the block when it appears first.
    pub fn parse(text: &str) -> Result<Self, KineticError> {
        let mut keymap = KeyMap::default();
        let mut declared_type: Option<String> = None;
        let mut in_block = false;
        let mut closed = false;

        for (line_num, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(":=") else {
                return Err(KineticError::InvalidConfiguration(format!(
                    "line {}: expected 'keyword := value', found '{}'",
                    line_num + 1,
                    line
                )));
            };
            let key = normalise_key(key);
            let value = value.trim();

            let header = key.strip_suffix(" parameters").filter(|_| value.is_empty());
            if let Some(name) = header {
                if let Some(ended) = name.strip_prefix("end ") {
                    if !in_block || Some(ended) != keymap.name.as_deref().map(normalise_key).as_deref()
                    {
                        return Err(KineticError::InvalidConfiguration(format!(
                            "line {}: unexpected '{}'",
                            line_num + 1,
                            line
                        )));
                    }
                    in_block = false;
                    closed = true;
                } else if !in_block && !closed {
                    in_block = true;
                    keymap.name = Some(original_case_name(line));
                } else {
                    return Err(KineticError::InvalidConfiguration(format!(
                        "line {}: nested parameter block '{}'",
                        line_num + 1,
                        line
                    )));
                }
                continue;
            }

            if in_block {
                keymap.entries.push((key, value.to_string()));
            } else if key == "kinetic model type" && !closed {
                declared_type = Some(value.to_string());
            }
        }

        if in_block {
            return Err(KineticError::InvalidConfiguration(format!(
                "parameter block '{}' is not closed",
                keymap.name.unwrap_or_default()
            )));
        }

        if let (Some(declared), Some(name)) = (&declared_type, &keymap.name) {
            if normalise_key(declared) != normalise_key(name) {
                return Err(KineticError::InvalidConfiguration(format!(
                    "kinetic model type '{}' does not match parameter block '{}'",
                    declared, name
                )));
            }
        }
        if keymap.name.is_none() {
            keymap.name = declared_type;
        }

        Ok(keymap)
    }

    /// Name of the block, e.g. `Patlak Plot`
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Value of the last occurrence of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalise_key(key);
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the value of `key`, `None` when it is absent
    pub fn parse_value<T>(&self, key: &str) -> Result<Option<T>, KineticError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    KineticError::InvalidConfiguration(format!(
                        "cannot parse '{}' for '{}': {}",
                        value, key, e
                    ))
                })
            })
            .transpose()
    }

    /// Boolean value written as `0`/`1` or `true`/`false`
    pub fn parse_flag(&self, key: &str) -> Result<Option<bool>, KineticError> {
        self.get(key)
            .map(|value| match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(KineticError::InvalidConfiguration(format!(
                    "'{}' is not a valid flag for '{}'",
                    value, key
                ))),
            })
            .transpose()
    }
}

/// `Patlak Plot Parameters:=` → `Patlak Plot`
fn original_case_name(line: &str) -> String {
    let key = line.split_once(":=").map_or(line, |(key, _)| key);
    let words: Vec<&str> = key.split_whitespace().collect();
    words[..words.len().saturating_sub(1)].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATLAK: &str = "
Patlak Plot Parameters:=

time frame definition filename := frames.txt
starting frame := 23
calibration factor := 9000
blood data filename :=  blood_file.txt
; In seconds
Time Shift := 0
In total counts := 1

end Patlak Plot Parameters:=
";

    #[test]
    fn parses_block() {
        let keymap = KeyMap::parse(PATLAK).unwrap();
        assert_eq!(keymap.name(), Some("Patlak Plot"));
        assert_eq!(keymap.get("Time Frame Definition Filename"), Some("frames.txt"));
        assert_eq!(keymap.get("blood data filename"), Some("blood_file.txt"));
        assert_eq!(keymap.parse_value::<usize>("starting frame").unwrap(), Some(23));
        assert_eq!(keymap.parse_value::<f64>("time   shift").unwrap(), Some(0.0));
        assert_eq!(keymap.parse_flag("in total counts").unwrap(), Some(true));
        assert_eq!(keymap.parse_value::<f64>("absent").unwrap(), None);
        assert_eq!(keymap.keys().count(), 6);
    }

    #[test]
    fn semicolon_inside_a_value_is_kept() {
        let text = "Patlak Plot Parameters:=
blood data filename := plasma;v2.txt ; corrected curve
time frame definition filename := frames.txt;
  ; indented comment := ignored
end Patlak Plot Parameters:=
";
        let keymap = KeyMap::parse(text).unwrap();
        assert_eq!(keymap.get("blood data filename"), Some("plasma;v2.txt"));
        assert_eq!(keymap.get("time frame definition filename"), Some("frames.txt;"));
        assert_eq!(keymap.keys().count(), 2);
    }

    #[test]
    fn model_type_line_names_the_block() {
        let text = format!("Kinetic Model type := Patlak Plot\n{PATLAK}");
        assert_eq!(KeyMap::parse(&text).unwrap().name(), Some("Patlak Plot"));

        let text = format!("Kinetic Model type := Logan Plot\n{PATLAK}");
        assert!(KeyMap::parse(&text).is_err());
    }

    #[test]
    fn unclosed_block_is_rejected() {
        let err = KeyMap::parse("Patlak Plot Parameters:=\nstarting frame := 2\n").unwrap_err();
        assert!(matches!(err, KineticError::InvalidConfiguration(_)));
    }

    #[test]
    fn mismatched_end_is_rejected() {
        let text = "Patlak Plot Parameters:=\nend Logan Plot Parameters:=\n";
        assert!(KeyMap::parse(text).is_err());
    }

    #[test]
    fn line_without_separator_is_rejected() {
        assert!(KeyMap::parse("Patlak Plot Parameters:=\nstarting frame 3\n").is_err());
    }

    #[test]
    fn bad_values_are_reported() {
        let keymap =
            KeyMap::parse("X Parameters:=\nstarting frame := two\nflag := maybe\nend X Parameters:=")
                .unwrap();
        assert!(keymap.parse_value::<usize>("starting frame").is_err());
        assert!(keymap.parse_flag("flag").is_err());
    }
}
