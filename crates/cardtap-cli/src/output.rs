//! Rendering of finished readings.

use crate::cli::OutputFormat;
use anyhow::Result;
use cardtap_reader::CompletedReading;

pub fn render(reading: &CompletedReading, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "[{}] {}\n{}",
            reading.tag.detected_at().format("%H:%M:%S"),
            reading.tag.uid_hex(),
            reading.result
        )),
        OutputFormat::Json => Ok(serde_json::to_string(reading)?),
    }
}

/// Print a reading to stdout, logging instead if it cannot be rendered.
pub fn print(reading: &CompletedReading, format: OutputFormat) {
    match render(reading, format) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::error!(error = %e, "Failed to render reading"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtap_core::{ReadingResult, TagHandle};

    fn completed(result: ReadingResult) -> CompletedReading {
        CompletedReading {
            tag: TagHandle::new(vec![0x04, 0xAB, 0xCD, 0xEF], ["nfc-a"]).unwrap(),
            result,
        }
    }

    #[test]
    fn test_text_output() {
        let text = render(&completed(ReadingResult::UnsupportedTag), OutputFormat::Text).unwrap();
        assert!(text.contains("04ABCDEF"));
        assert!(text.ends_with("Unsupported card type."));
    }

    #[test]
    fn test_json_output() {
        let json = render(
            &completed(ReadingResult::transport_failure("Tag was lost")),
            OutputFormat::Json,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["result"]["status"], "transport_failure");
        assert_eq!(value["result"]["reason"], "Tag was lost");
        assert_eq!(value["tag"]["uid"], "04abcdef");
    }
}
