// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Text recognition engine interface
//!
//! Recognition is an external capability. Stages talk to it through
//! [`TextRecognizer`]; [`TesseractCli`] drives the `tesseract` executable,
//! and any `Fn(&GrayImage, &RecognitionOptions) -> Result<String>` closure
//! works as an engine (handy for tests).

use crate::error::{Result, VisionError};
use image::{GrayImage, ImageFormat};
use std::io::Write;
use std::process::Command;

/// Recognition model family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Neural (LSTM) line recognizer only
    Lstm,
    /// Engine default
    Default,
}

impl EngineMode {
    fn oem(self) -> &'static str {
        match self {
            EngineMode::Lstm => "1",
            EngineMode::Default => "3",
        }
    }
}

/// How a single image should be recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub engine: EngineMode,
    /// Characters the engine may emit; `None` means unrestricted
    pub alphabet: Option<String>,
}

impl RecognitionOptions {
    pub const DIGITS: &'static str = "0123456789";

    /// Single line of digits
    pub fn digits(engine: EngineMode) -> Self {
        Self {
            engine,
            alphabet: Some(Self::DIGITS.to_string()),
        }
    }

    /// Single line of unrestricted text
    pub fn text() -> Self {
        Self {
            engine: EngineMode::Default,
            alphabet: None,
        }
    }
}

/// A text recognition engine for single-line crops
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, options: &RecognitionOptions) -> Result<String>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&GrayImage, &RecognitionOptions) -> Result<String> + Send + Sync,
{
    fn recognize(&self, image: &GrayImage, options: &RecognitionOptions) -> Result<String> {
        self(image, options)
    }
}

/// Runs the `tesseract` command line tool on a temporary PNG
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    /// Environment variable overriding the executable path
    pub const COMMAND_ENV: &'static str = "TESSERACT_CMD";

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Use `TESSERACT_CMD` if set, otherwise `tesseract` from `PATH`
    pub fn from_env() -> Self {
        let command = std::env::var(Self::COMMAND_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "tesseract".to_string());
        Self::new(command)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Engine arguments following `<input> stdout`
    fn engine_args(options: &RecognitionOptions) -> Vec<String> {
        let mut args = vec![
            "--oem".to_string(),
            options.engine.oem().to_string(),
            "--psm".to_string(),
            // Single text line
            "7".to_string(),
        ];
        if let Some(alphabet) = &options.alphabet {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", alphabet));
        }
        args
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &GrayImage, options: &RecognitionOptions) -> Result<String> {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        image
            .write_to(&mut tmp, ImageFormat::Png)
            .map_err(|e| VisionError::Recognition(format!("failed to encode crop: {}", e)))?;
        tmp.flush()?;

        let output = Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .args(Self::engine_args(options))
            .output()
            .map_err(|e| {
                VisionError::Recognition(format!(
                    "failed to run {} (is it installed?): {}",
                    self.command, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisionError::Recognition(format!(
                "{} failed: {}",
                self.command,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_args_for_digits() {
        let args = TesseractCli::engine_args(&RecognitionOptions::digits(EngineMode::Lstm));
        assert_eq!(
            args,
            vec![
                "--oem",
                "1",
                "--psm",
                "7",
                "-c",
                "tessedit_char_whitelist=0123456789"
            ]
        );
    }

    #[test]
    fn test_engine_args_for_text() {
        let args = TesseractCli::engine_args(&RecognitionOptions::text());
        assert_eq!(args, vec!["--oem", "3", "--psm", "7"]);
    }

    #[test]
    fn test_closure_recognizer() {
        let engine = |_: &GrayImage, options: &RecognitionOptions| -> Result<String> {
            Ok(if options.alphabet.is_some() { "101" } else { "OFFICE" }.to_string())
        };
        let image = GrayImage::new(4, 4);

        assert_eq!(
            engine
                .recognize(&image, &RecognitionOptions::digits(EngineMode::Default))
                .unwrap(),
            "101"
        );
        assert_eq!(engine.recognize(&image, &RecognitionOptions::text()).unwrap(), "OFFICE");
    }

    #[test]
    fn test_missing_executable_is_recognition_error() {
        let engine = TesseractCli::new("storemap-no-such-ocr-binary");
        let result = engine.recognize(&GrayImage::new(8, 8), &RecognitionOptions::text());
        match result {
            Err(VisionError::Recognition(message)) => assert!(message.contains(engine.command())),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
