use clap::Parser;
use std::path::PathBuf;

/// Start up settings.  The binary fills this from the command line and the environment, the
/// library and tests use `Config::default()`.
#[derive(Parser, Clone, Debug, PartialEq)]
#[command(name = "rpforth")]
#[command(about = "Incrementally compiled threaded-code stack machine")]
pub struct Config {
    /// Image to load before the first prompt, named without the `.json` extension.
    pub image: Option<String>,

    /// Do not print the data stack after each executed line.
    #[arg(long)]
    pub no_stack_print: bool,

    /// Directory that `save`, `load` and `s.` read and write images in.
    #[arg(long, env = "RPFORTH_IMAGE_DIR", default_value = ".")]
    pub image_dir: PathBuf,

    /// Name of the image written by `s.`.
    #[arg(long, default_value = "tempsave")]
    pub autosave_name: String,

    /// Log filter, for example `debug` or `rpforth=trace`.
    #[arg(long, env = "RPFORTH_LOG", default_value = "warn")]
    pub log: String,

    /// Line editor history file.  Defaults to `.rpforth_history` in the home directory.
    #[arg(long)]
    pub history: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            image: None,
            no_stack_print: false,
            image_dir: PathBuf::from("."),
            autosave_name: "tempsave".to_string(),
            log: "warn".to_string(),
            history: None,
        }
    }
}

impl Config {
    /// Full path of the image file for a name.
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(format!("{}.json", name))
    }

    /// Where the line editor keeps its history, if anywhere.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history.clone().or_else(|| {
            dirs::home_dir().map(|mut path| {
                path.push(".rpforth_history");
                path
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_defaults() {
        let config = Config::parse_from(["rpforth", "--no-stack-print", "--image-dir", "/tmp", "work"]);

        assert!(config.no_stack_print);
        assert_eq!(config.image.as_deref(), Some("work"));
        assert_eq!(config.image_path("work"), PathBuf::from("/tmp/work.json"));
    }
}
