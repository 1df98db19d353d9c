//! Console progress bars for training and evaluation passes.

use indicatif::{ProgressBar, ProgressStyle};

/// Step counter for one pass over a cohort. Draws nothing when stderr is
/// not a terminal.
pub fn step_bar(len: usize, label: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_prefix(label);
    bar
}
