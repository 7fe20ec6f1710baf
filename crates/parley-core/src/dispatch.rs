//! Selection of the response strategy for a user input.
//!
//! Rules are evaluated in order:
//!
//! 1. a bare CSV URL with no image attached loads a dataset (no model call)
//! 2. an attached image selects the image-grounded one-shot
//! 3. a loaded dataset selects the dataset-grounded one-shot
//! 4. otherwise the persistent free-form chat is used

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::LoadedDataset;
use crate::session::Attachment;

/// Prompt used for an image turn without accompanying text.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image.";

static CSV_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://[^\s$.?#].[^\s]*\.csv)$").expect("CSV URL pattern is valid")
});

/// The response-generation strategy chosen for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Load the CSV at `url`; not a chat turn.
    DatasetLoad { url: String },
    /// Single non-conversational call carrying the image.
    ImageOneShot,
    /// Stateless call that re-sends the grounding instruction and full history.
    DatasetOneShot,
    /// Reuse or lazily create the stateful session.
    FreeFormChat,
}

/// True when `input` (after trimming) is nothing but an http(s) URL ending in `.csv`.
pub fn is_csv_url(input: &str) -> bool {
    CSV_URL.is_match(input.trim())
}

/// Decides how to answer `input` given the ambient attachment and dataset state.
pub fn decide(
    input: &str,
    image: Option<&Attachment>,
    dataset: Option<&LoadedDataset>,
) -> Strategy {
    if image.is_none() && is_csv_url(input) {
        return Strategy::DatasetLoad {
            url: input.trim().to_string(),
        };
    }
    if image.is_some() {
        return Strategy::ImageOneShot;
    }
    if dataset.is_some() {
        return Strategy::DatasetOneShot;
    }
    Strategy::FreeFormChat
}

/// Text sent with an image: the user's text, or the default prompt when empty.
pub fn image_prompt(text: &str) -> &str {
    if text.is_empty() {
        DEFAULT_IMAGE_PROMPT
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ParsedCsv;

    fn dataset() -> LoadedDataset {
        LoadedDataset::new(
            "data.csv",
            ParsedCsv {
                records: Vec::new(),
                raw_text: "a,b\n".to_string(),
            },
        )
    }

    fn image() -> Attachment {
        Attachment::image("cat.png", "image/png", vec![1, 2, 3])
    }

    #[test]
    fn test_csv_url_pattern() {
        assert!(is_csv_url("https://example.com/data.csv"));
        assert!(is_csv_url("  HTTP://example.com/path/DATA.CSV  "));
        assert!(!is_csv_url("https://example.com/data.csv please"));
        assert!(!is_csv_url("see https://example.com/data.csv"));
        assert!(!is_csv_url("https://example.com/data.json"));
        assert!(!is_csv_url("ftp://example.com/data.csv"));
        assert!(!is_csv_url("https://exa mple.com/data.csv"));
    }

    #[test]
    fn test_csv_url_loads_dataset_without_image() {
        for loaded in [None, Some(dataset())] {
            let strategy = decide(" https://example.com/a.csv ", None, loaded.as_ref());
            assert_eq!(
                strategy,
                Strategy::DatasetLoad {
                    url: "https://example.com/a.csv".to_string()
                }
            );
        }
    }

    #[test]
    fn test_image_always_wins() {
        let img = image();
        let data = dataset();
        assert_eq!(decide("what is it", Some(&img), None), Strategy::ImageOneShot);
        assert_eq!(decide("what is it", Some(&img), Some(&data)), Strategy::ImageOneShot);
        assert_eq!(
            decide("https://example.com/a.csv", Some(&img), Some(&data)),
            Strategy::ImageOneShot
        );
    }

    #[test]
    fn test_dataset_then_free_form() {
        let data = dataset();
        assert_eq!(decide("sum column a", None, Some(&data)), Strategy::DatasetOneShot);
        assert_eq!(decide("hello", None, None), Strategy::FreeFormChat);
    }

    #[test]
    fn test_image_prompt_default() {
        assert_eq!(image_prompt(""), DEFAULT_IMAGE_PROMPT);
        assert_eq!(image_prompt("count the cats"), "count the cats");
    }
}
