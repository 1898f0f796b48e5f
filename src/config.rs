//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External print command and pacing.
    pub printer: PrinterCfg,
    /// Where generated and static files live.
    pub paths: PathsCfg,
    /// Fonts tried for label text.
    #[serde(default)]
    pub fonts: FontsCfg,
}

/// External print command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterCfg {
    /// Program that prints a PDF (e.g. Acrobat Reader).
    pub command: String,
    /// Flags placed before the document path.
    pub args: Vec<String>,
    /// Cooldown after each print command, in seconds.
    pub interval_secs: u64,
    /// Kill the print command after this many seconds; 0 waits forever.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl PrinterCfg {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Output and resource directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsCfg {
    /// Generated code images.
    pub image_dir: PathBuf,
    /// Generated PDFs.
    pub pdf_dir: PathBuf,
    /// Static `<type>-69.png` label images.
    pub resource_dir: PathBuf,
}

/// Font candidates, first readable one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontsCfg {
    pub candidates: Vec<PathBuf>,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}

impl Default for Config {
    /// Defaults match a Windows workstation with Acrobat Reader installed.
    fn default() -> Self {
        Self {
            printer: PrinterCfg {
                command: r"C:\Program Files (x86)\Adobe\Acrobat Reader DC\Reader\AcroRd32.exe"
                    .into(),
                args: vec!["/p".into(), "/h".into()],
                interval_secs: 5,
                timeout_secs: 0,
            },
            paths: PathsCfg {
                image_dir: "images".into(),
                pdf_dir: "pdf".into(),
                resource_dir: "resources/images".into(),
            },
            fonts: FontsCfg {
                candidates: vec![
                    "resources/fonts/PingFang Regular_0.ttf".into(),
                    r"C:\Windows\Fonts\msyh.ttf".into(),
                    r"C:\Windows\Fonts\simhei.ttf".into(),
                    r"C:\Windows\Fonts\simkai.ttf".into(),
                ],
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Config with every directory under `root` and a zero cooldown.
    pub(crate) fn config_in(root: &Path) -> Config {
        Config {
            printer: PrinterCfg {
                command: "true".into(),
                args: vec![],
                interval_secs: 0,
                timeout_secs: 0,
            },
            paths: PathsCfg {
                image_dir: root.join("images"),
                pdf_dir: root.join("pdf"),
                resource_dir: root.join("resources"),
            },
            fonts: FontsCfg::default(),
        }
    }

    #[test]
    fn test_load_or_default_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let cfg = Config::load_or_default(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.printer.args, vec!["/p", "/h"]);
        assert_eq!(cfg.printer.cooldown(), Duration::from_secs(5));
        assert_eq!(cfg.printer.timeout(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[printer]
command = "lp"
args = ["-s"]
interval_secs = 2
timeout_secs = 30

[paths]
image_dir = "img"
pdf_dir = "out"
resource_dir = "res"
"#,
        )
        .unwrap();
        let cfg = Config::load_or_default(&path).unwrap();
        assert_eq!(cfg.printer.command, "lp");
        assert_eq!(cfg.printer.timeout(), Some(Duration::from_secs(30)));
        assert!(cfg.fonts.candidates.is_empty());
        assert_eq!(cfg.paths.pdf_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_save_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.printer.interval_secs = 9;
        cfg.save(&path).unwrap();
        let back = Config::load_or_default(&path).unwrap();
        assert_eq!(back.printer.interval_secs, 9);
        assert_eq!(back.fonts.candidates, cfg.fonts.candidates);
    }
}
