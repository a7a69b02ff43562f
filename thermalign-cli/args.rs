use std::path::PathBuf;
use std::str::FromStr;

use crate::config::AppConfig;
use crate::error::ArgsError;

pub const USAGE: &str = "\
Usage: thermalign <INPUT_DIR> <OUTPUT_DIR> [OPTIONS]

Aligns every <prefix>_<seq>_T thermal image in INPUT_DIR onto its
<prefix>_<seq>_Z visible counterpart and writes <prefix>_<seq>_AT overlays.

Options:
  --alpha A              Thermal layer weight in [0, 1] (default 0.5)
  --config FILE          Load settings from a .toml or .json file
  --max-features N       Keypoints per image (default 5000)
  --keep-fraction F      Share of best matches kept (default 0.15)
  --min-matches N        Matches required for a homography (default 10)
  --ransac-threshold PX  Inlier reprojection error (default 5.0)
  --threads N            Worker threads (default: all cores)
  --debug-keypoints      Also write <name>_AT_keypoints.png
  --dump-config          Print the effective configuration as TOML and exit
  -h, --help             Show this help";

/// Parsed command line; unset options leave the configuration untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub alpha: Option<f32>,
    pub max_features: Option<usize>,
    pub keep_fraction: Option<f64>,
    pub min_matches: Option<usize>,
    pub ransac_threshold: Option<f64>,
    pub threads: Option<usize>,
    pub debug_keypoints: bool,
    pub dump_config: bool,
    pub help: bool,
}

fn value<T: FromStr>(option: &'static str, args: &mut impl Iterator<Item = String>) -> Result<T, ArgsError> {
    let raw = args.next().ok_or(ArgsError::MissingValue(option))?;
    raw.parse().map_err(|_| ArgsError::InvalidValue { option, value: raw })
}

impl CliOptions {
    /// Parse arguments, excluding the program name
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ArgsError> {
        let mut opts = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => opts.help = true,
                "--alpha" => opts.alpha = Some(value("--alpha", &mut args)?),
                "--config" => opts.config = Some(value("--config", &mut args)?),
                "--max-features" => opts.max_features = Some(value("--max-features", &mut args)?),
                "--keep-fraction" => opts.keep_fraction = Some(value("--keep-fraction", &mut args)?),
                "--min-matches" => opts.min_matches = Some(value("--min-matches", &mut args)?),
                "--ransac-threshold" => opts.ransac_threshold = Some(value("--ransac-threshold", &mut args)?),
                "--threads" => opts.threads = Some(value("--threads", &mut args)?),
                "--debug-keypoints" => opts.debug_keypoints = true,
                "--dump-config" => opts.dump_config = true,
                other if other.starts_with('-') && other.len() > 1 => {
                    return Err(ArgsError::UnknownOption(other.to_string()));
                }
                _ if opts.input_dir.is_none() => opts.input_dir = Some(PathBuf::from(arg)),
                _ if opts.output_dir.is_none() => opts.output_dir = Some(PathBuf::from(arg)),
                _ => return Err(ArgsError::UnexpectedArgument(arg)),
            }
        }
        Ok(opts)
    }

    /// Override `cfg` with every option given on the command line
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(dir) = &self.input_dir {
            cfg.input_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = Some(dir.clone());
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }
        if let Some(n) = self.max_features {
            cfg.features.max_features = n;
        }
        if let Some(f) = self.keep_fraction {
            cfg.registration.keep_fraction = f;
        }
        if let Some(n) = self.min_matches {
            cfg.registration.min_match_count = n;
        }
        if let Some(px) = self.ransac_threshold {
            cfg.registration.ransac_threshold = px;
        }
        if let Some(n) = self.threads {
            cfg.features.n_threads = n;
        }
        if self.debug_keypoints {
            cfg.debug_keypoints = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions, ArgsError> {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_positional_and_options() {
        let opts = parse(&["in", "--alpha", "0.7", "out", "--min-matches", "12", "--debug-keypoints"]).unwrap();
        assert_eq!(opts.input_dir, Some(PathBuf::from("in")));
        assert_eq!(opts.output_dir, Some(PathBuf::from("out")));
        assert_eq!(opts.alpha, Some(0.7));
        assert_eq!(opts.min_matches, Some(12));
        assert!(opts.debug_keypoints);
        assert!(!opts.dump_config);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(&["--bogus"]), Err(ArgsError::UnknownOption("--bogus".to_string())));
        assert_eq!(parse(&["in", "--alpha"]), Err(ArgsError::MissingValue("--alpha")));
        assert_eq!(
            parse(&["--threads", "many"]),
            Err(ArgsError::InvalidValue {
                option: "--threads",
                value: "many".to_string()
            })
        );
        assert_eq!(parse(&["a", "b", "c"]), Err(ArgsError::UnexpectedArgument("c".to_string())));
    }

    #[test]
    fn test_flags_override_file_values() {
        let mut cfg = AppConfig::from_toml("alpha = 0.2\n[registration]\nkeep_fraction = 0.3\n").unwrap();
        let opts = parse(&["in", "out", "--keep-fraction", "0.25", "--ransac-threshold", "3.5"]).unwrap();
        opts.apply(&mut cfg);
        assert_eq!(cfg.alpha, 0.2);
        assert_eq!(cfg.registration.keep_fraction, 0.25);
        assert_eq!(cfg.registration.ransac_threshold, 3.5);
        assert_eq!(cfg.output_dir, Some(PathBuf::from("out")));
    }
}
