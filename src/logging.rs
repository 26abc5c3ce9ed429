use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// The run's log file, attached once the run directory exists.
#[derive(Clone, Default)]
pub struct LogFile(Arc<Mutex<Option<File>>>);

impl LogFile {
    /// Copies every following log line into `path`. Returns `false` if the
    /// file cannot be created; stderr logging is unaffected.
    pub fn attach(&self, path: &Path) -> bool {
        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Could not open log file {}: {}", path.display(), e);
                return false;
            }
        };
        match self.0.lock() {
            Ok(mut slot) => {
                *slot = Some(file);
                true
            }
            Err(_) => false,
        }
    }
}

/// Copies every log line to stderr and, when attached, the run's log file.
struct Tee {
    file: LogFile,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Ok(mut slot) = self.file.0.lock() {
            // Give up on the file after the first failed write.
            if slot.as_mut().is_some_and(|file| file.write_all(buf).is_err()) {
                *slot = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut slot) = self.file.0.lock() {
            if let Some(file) = slot.as_mut() {
                file.flush()?;
            }
        }
        Ok(())
    }
}

/// Installs the global logger writing to stderr. `RUST_LOG` overrides the
/// default `info` level. Attach the run's log file through the returned
/// handle once its directory exists.
pub fn init() -> LogFile {
    let file = LogFile::default();
    let installed = Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(Tee { file: file.clone() })))
        .format_timestamp_secs()
        .try_init();
    if installed.is_err() {
        eprintln!("A logger is already installed; the run log file will stay empty");
    }
    file
}
