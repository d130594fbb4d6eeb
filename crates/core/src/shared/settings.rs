use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    APP_DIR_NAME, DEFAULT_BIT_RATE, DEFAULT_BOX_THICKNESS, DEFAULT_CONFIDENCE,
    DEFAULT_MODEL_PATH, DEFAULT_OUTPUT_DIR, DEFAULT_PROGRESS_INTERVAL, OUTPUT_EXTENSION,
    OUTPUT_SUFFIX,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Everything a scan run needs besides the input path.
///
/// Replaces process-wide constants: the CLI builds one of these and passes
/// it down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub output_dir: PathBuf,
    pub confidence: f64,
    pub progress_interval: usize,
    /// Overrides the class names embedded in the model when non-empty.
    pub class_labels: Vec<String>,
    pub label_font: Option<PathBuf>,
    pub show_confidence: bool,
    pub box_thickness: u32,
    pub threaded: bool,
    pub bit_rate: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_url: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            confidence: DEFAULT_CONFIDENCE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            class_labels: Vec::new(),
            label_font: None,
            show_confidence: true,
            box_thickness: DEFAULT_BOX_THICKNESS,
            threaded: false,
            bit_rate: DEFAULT_BIT_RATE,
        }
    }
}

impl ScanSettings {
    /// `<user config dir>/RoadScan/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings from `explicit` if given (errors are fatal), otherwise
    /// from the user settings file if it exists and parses, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            return Ok(Self::default());
        };
        match Self::from_file(&path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("Ignoring user settings: {e}");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SettingsError::Invalid(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        if self.progress_interval == 0 {
            return Err(SettingsError::Invalid(
                "Progress interval must be at least 1 frame".to_string(),
            ));
        }
        if self.box_thickness == 0 {
            return Err(SettingsError::Invalid(
                "Box thickness must be at least 1 pixel".to_string(),
            ));
        }
        if self.bit_rate == 0 {
            return Err(SettingsError::Invalid(
                "Bit rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `<output_dir>/<input stem>_detected.mp4`
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.output_dir
            .join(format!("{stem}{OUTPUT_SUFFIX}.{OUTPUT_EXTENSION}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let s = ScanSettings::default();
        assert_relative_eq!(s.confidence, 0.25);
        assert_eq!(s.progress_interval, 50);
        assert_eq!(s.output_dir, PathBuf::from("output_results"));
        assert!(!s.threaded);
        assert!(s.validate().is_ok());
    }

    #[rstest]
    #[case::plain("videos/street.mov", "output_results/street_detected.mp4")]
    #[case::dotted("a/b/run.2024.avi", "output_results/run.2024_detected.mp4")]
    #[case::no_extension("clip", "output_results/clip_detected.mp4")]
    fn test_output_path_for(#[case] input: &str, #[case] expected: &str) {
        let s = ScanSettings::default();
        assert_eq!(s.output_path_for(Path::new(input)), PathBuf::from(expected));
    }

    #[rstest]
    #[case::confidence_high(ScanSettings { confidence: 1.5, ..Default::default() })]
    #[case::confidence_negative(ScanSettings { confidence: -0.1, ..Default::default() })]
    #[case::zero_interval(ScanSettings { progress_interval: 0, ..Default::default() })]
    #[case::zero_thickness(ScanSettings { box_thickness: 0, ..Default::default() })]
    #[case::zero_bit_rate(ScanSettings { bit_rate: 0, ..Default::default() })]
    fn test_validate_rejects(#[case] settings: ScanSettings) {
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "confidence": 0.4, "class_labels": ["Crack", "Pothole"] }"#,
        )
        .unwrap();

        let s = ScanSettings::from_file(&path).unwrap();
        assert_relative_eq!(s.confidence, 0.4);
        assert_eq!(s.class_labels, vec!["Crack", "Pothole"]);
        assert_eq!(s.progress_interval, 50);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScanSettings::load(Some(&dir.path().join("missing.json")));
        assert!(matches!(result, Err(SettingsError::Read { .. })));
    }

    #[test]
    fn test_explicit_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ScanSettings::load(Some(&path)),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let s = ScanSettings {
            model_url: Some("https://example.com/rdd.onnx".to_string()),
            threaded: true,
            ..Default::default()
        };
        let json = serde_json::to_string_pretty(&s).unwrap();
        let back: ScanSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
