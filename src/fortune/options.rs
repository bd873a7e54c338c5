//! Fortune selection options and their command-line form.

use serde::{Deserialize, Serialize};

/// Options controlling which fortune is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortuneOptions {
    /// Choose from all lists of maxims, both offensive and not (`-a`)
    pub all: bool,
    /// Show the cookie file the fortune came from (`-c`)
    pub show_cookie: bool,
    /// Consider all fortune files to be of equal size (`-e`)
    pub equal: bool,
    /// Long fortunes only (`-l`)
    pub long: bool,
    /// Short fortunes only (`-s`)
    pub short: bool,
    /// Case-insensitive pattern matching (`-i`)
    pub ignore_case: bool,
    /// Wait before termination for a time proportional to the length (`-w`)
    pub wait: bool,
    /// Longest fortune considered short (`-n`); zero leaves the default
    pub length: usize,
    /// Print all fortunes matching this regular expression (`-m`)
    pub pattern: Option<String>,
    /// Fortune files or directories to choose from
    pub files: Vec<String>,
    /// Selection percentages, paired with `files` by index
    pub percentages: Vec<String>,
}

impl FortuneOptions {
    /// Translate the options into arguments for the fortune executable.
    pub fn to_args(&self) -> Vec<String> {
        let flags = [
            (self.all, "-a"),
            (self.show_cookie, "-c"),
            (self.equal, "-e"),
            (self.long, "-l"),
            (self.short, "-s"),
            (self.ignore_case, "-i"),
            (self.wait, "-w"),
        ];

        let mut args: Vec<String> = flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| flag.to_string())
            .collect();

        if self.length > 0 {
            args.push("-n".to_string());
            args.push(self.length.to_string());
        }

        if let Some(pattern) = self.pattern.as_deref().filter(|p| !p.is_empty()) {
            args.push("-m".to_string());
            args.push(pattern.to_string());
        }

        for (i, file) in self.files.iter().enumerate() {
            match self.percentages.get(i).filter(|p| !p.is_empty()) {
                Some(percentage) => {
                    args.push(format!("{percentage}%"));
                    args.push(file.clone());
                }
                None => args.push(file.clone()),
            }
        }

        args
    }
}
