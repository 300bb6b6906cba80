use indicatif::{ProgressBar, ProgressStyle};
use keygate_provision::{JobState, JobStatus};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {percent:>3}%";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

const SCALE: u64 = 1000;

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(style) => style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };
    Some(style)
});

/// Terminal rendering of a polled [`JobStatus`].
pub struct JobProgress {
    pb: ProgressBar,
}

impl JobProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(SCALE);
        let pb = match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };
        Self { pb }
    }

    pub fn update(&self, status: &JobStatus) {
        self.pb.set_prefix(stage_label(status.state));
        self.pb.set_position(scaled(status.progress));
    }

    pub fn finish(self, status: &JobStatus) {
        self.update(status);
        match status.state {
            JobState::Succeeded => self.pb.finish_with_message("done"),
            _ => self.pb.abandon(),
        }
    }
}

fn stage_label(state: JobState) -> &'static str {
    match state {
        JobState::Idle => "Waiting",
        JobState::Validating => "Validating",
        JobState::Downloading => "Downloading",
        JobState::Extracting => "Extracting",
        JobState::Persisting => "Saving",
        JobState::Succeeded => "Finished",
        JobState::Failed => "Failed",
    }
}

fn scaled(fraction: f32) -> u64 {
    (f64::from(fraction.clamp(0.0, 1.0)) * SCALE as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        assert!(PB_TEMPLATE.is_some());
    }

    #[test]
    fn test_scaled() {
        assert_eq!(scaled(0.0), 0);
        assert_eq!(scaled(0.5), 500);
        assert_eq!(scaled(1.0), SCALE);
        assert_eq!(scaled(3.0), SCALE);
    }
}
