//! Classifier replaying recorded results.
//!
//! A script holds one `<label> <confidence>` pair per line. The confidence is the last
//! whitespace-separated token, everything before it is the label, so labels like
//! `tabby, tabby cat 0.81` work. Blank lines and lines starting with `#` are ignored.
use std::path::Path;

use anyhow::{Context, Result};
use simple_error::{simple_error, SimpleError};

use crate::sampler::{Classification, Classify};

pub struct ReplayClassifier {
    script: Vec<Classification>,
    cursor: usize,
    repeat: bool,
}

impl ReplayClassifier {
    /// Create a classifier replaying `script`, from the start again after the end if `repeat`.
    pub fn new(script: Vec<Classification>, repeat: bool) -> Self {
        Self {
            script,
            cursor: 0,
            repeat,
        }
    }

    /// Load a script from a file.
    pub fn from_path(path: impl AsRef<Path>, repeat: bool) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        let script =
            parse_script(&text).with_context(|| format!("invalid script {}", path.display()))?;
        log::info!("Loaded {} classifications from {}", script.len(), path.display());

        Ok(Self::new(script, repeat))
    }
}

impl Classify for ReplayClassifier {
    fn classify(&mut self) -> Result<Option<Classification>> {
        if self.cursor == self.script.len() {
            match self.repeat && !self.script.is_empty() {
                true => self.cursor = 0,
                false => return Ok(None),
            }
        }

        let classification = self.script[self.cursor].clone();
        self.cursor += 1;

        Ok(Some(classification))
    }
}

/// Parse a whole script, failing on the first malformed line.
pub fn parse_script(text: &str) -> Result<Vec<Classification>, SimpleError> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            parse_line(line).map_err(|err| simple_error!("line {}: {}", line_no, err))
        })
        .collect()
}

fn parse_line(line: &str) -> Result<Classification, SimpleError> {
    let (label, confidence) = line
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| simple_error!("expected `<label> <confidence>`, got `{}`", line))?;

    let confidence: f32 = confidence
        .parse()
        .map_err(|_| simple_error!("invalid confidence `{}`", confidence))?;

    Ok(Classification::new(label.trim_end(), confidence))
}

#[cfg(test)]
mod test {

    use super::*;

    const SCRIPT: &str = "\
# recorded in the kitchen
refrigerator 0.61
tabby, tabby cat 0.83

dining table 0.4
";

    #[test]
    fn test_parse_script() {
        let script = parse_script(SCRIPT).unwrap();
        assert_eq!(
            script,
            vec![
                Classification::new("refrigerator", 0.61),
                Classification::new("tabby, tabby cat", 0.83),
                Classification::new("dining table", 0.4),
            ]
        );
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = parse_script("cat 0.5\n\ndog high\n").unwrap_err();
        assert!(err.as_str().starts_with("line 3:"), "{}", err);

        let err = parse_script("lonely").unwrap_err();
        assert!(err.as_str().starts_with("line 1:"), "{}", err);
    }

    #[test]
    fn test_replay_ends() -> Result<()> {
        let mut classifier = ReplayClassifier::new(parse_script(SCRIPT)?, false);
        let mut labels = vec![];
        while let Some(classification) = classifier.classify()? {
            labels.push(classification.label);
        }
        assert_eq!(labels, vec!["refrigerator", "tabby, tabby cat", "dining table"]);
        assert_eq!(classifier.classify()?, None);
        Ok(())
    }

    #[test]
    fn test_replay_repeats() -> Result<()> {
        let mut classifier = ReplayClassifier::new(parse_script("a 0.1\nb 0.2")?, true);
        let labels = (0..5)
            .map(|_| classifier.classify().map(|c| c.map(|c| c.label)))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(
            labels,
            vec![
                Some("a".to_owned()),
                Some("b".to_owned()),
                Some("a".to_owned()),
                Some("b".to_owned()),
                Some("a".to_owned())
            ]
        );

        let mut empty = ReplayClassifier::new(vec![], true);
        assert_eq!(empty.classify()?, None);
        Ok(())
    }

    #[test]
    fn test_from_missing_path() {
        assert!(ReplayClassifier::from_path("does/not/exist.txt", false).is_err());
    }
}
