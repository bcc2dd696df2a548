mod classifier;
mod handle;
mod launcher;
mod types;

pub use classifier::{LineClassifier, PatternClassifier};
pub use handle::WorkerHandle;
pub use launcher::{CommandLauncher, Launcher};
pub use types::*;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{PatternConfig, WorkerConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_command_launcher_uses_configured_patterns() {
        let config = WorkerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo 'BOOT OK'; echo 'worker ready'".to_string()],
            patterns: PatternConfig {
                startup: vec!["^BOOT OK$".to_string()],
                progress: vec![],
                anomaly: vec![],
            },
            ..Default::default()
        };
        let launcher = CommandLauncher::new(config).unwrap();
        assert!(launcher.describe().starts_with("sh -c"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = launcher.launch(4, tx).unwrap();
        handle.wait_for_exit(Duration::from_secs(10)).await.unwrap();

        let mut startup_lines = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            match event.kind {
                WorkerEventKind::Output { signal, line, .. } => {
                    assert_eq!(signal, LineSignal::StartupComplete);
                    startup_lines.push(line);
                }
                WorkerEventKind::Exited(_) => {
                    if !startup_lines.is_empty() {
                        break;
                    }
                }
            }
        }
        assert_eq!(startup_lines, vec!["BOOT OK".to_string()]);
    }

    /// Every line with a `progress=` prefix is a completed cycle.
    struct PrefixClassifier;

    impl LineClassifier for PrefixClassifier {
        fn classify(&self, line: &str) -> LineSignal {
            if line.starts_with("progress=") {
                LineSignal::Progress
            } else {
                LineSignal::Unrecognized
            }
        }
    }

    #[tokio::test]
    async fn test_command_launcher_with_custom_classifier() {
        let config = WorkerConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo 'progress=1'; echo 'ERROR ignored'; echo 'progress=2'".to_string(),
            ],
            ..Default::default()
        };
        let launcher = CommandLauncher::with_classifier(config, Arc::new(PrefixClassifier));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = launcher.launch(1, tx).unwrap();

        let mut lines = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
            match event.kind {
                WorkerEventKind::Output { signal, line, .. } => {
                    assert_eq!(signal, LineSignal::Progress);
                    lines.push(line);
                }
                WorkerEventKind::Exited(_) => break,
            }
        }
        assert_eq!(lines, vec!["progress=1".to_string(), "progress=2".to_string()]);
    }

    #[test]
    fn test_command_launcher_rejects_bad_pattern() {
        let config = WorkerConfig {
            program: "true".to_string(),
            patterns: PatternConfig {
                startup: vec!["(unclosed".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(CommandLauncher::new(config).is_err());
    }
}
