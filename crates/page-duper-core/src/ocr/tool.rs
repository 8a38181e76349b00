use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::OcrToolError;

const TOOL: &str = "ocrmypdf";
const INSTALL_HINT: &str = "install ocrmypdf and make sure it is on your PATH";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// An external OCR program that turns `input` into a searchable `output`.
pub trait OcrTool: Send + Sync {
    fn run(&self, input: &Path, output: &Path) -> Result<(), OcrToolError>;
}

/// `ocrmypdf` with page rotation, deskew and PDF/A output.
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    languages: String,
    jobs: usize,
    timeout: Duration,
}

impl OcrMyPdf {
    pub fn new(languages: &str, jobs: usize, timeout: Duration) -> Self {
        Self {
            languages: languages.to_string(),
            jobs,
            timeout,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(TOOL);
        cmd.arg("-l")
            .arg(&self.languages)
            .arg("--rotate-pages")
            .arg("--deskew")
            .arg("--jobs")
            .arg(self.jobs.to_string())
            .arg("--output-type")
            .arg("pdfa")
            .arg(input)
            .arg(output);
        cmd
    }
}

impl OcrTool for OcrMyPdf {
    fn run(&self, input: &Path, output: &Path) -> Result<(), OcrToolError> {
        debug!("Running {} on {}", TOOL, input.display());
        run_with_timeout(self.command(input, output), TOOL, self.timeout)
    }
}

/// Spawn `cmd` and wait at most `timeout` for it. On Unix the child leads its
/// own process group, and the whole group is killed on timeout so helpers it
/// spawned go with it. stderr is drained on a separate thread; once the child
/// has exited we wait at most `STDERR_GRACE` for the pipe to close, since a
/// leftover grandchild may still hold it open.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    tool: &'static str,
    timeout: Duration,
) -> Result<(), OcrToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(OcrToolError::ToolMissing {
                tool,
                hint: INSTALL_HINT,
            })
        }
        Err(e) => return Err(OcrToolError::Io(e)),
    };

    let stderr_pipe = child.stderr.take();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_process_tree(&mut child);
            return Err(OcrToolError::Timeout { tool, timeout });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stderr = rx.recv_timeout(STDERR_GRACE).unwrap_or_default();
    trace!("{} finished with {}", tool, status);
    if status.success() {
        Ok(())
    } else {
        Err(OcrToolError::Failed {
            tool,
            code: status.code(),
            stderr: stderr.trim().to_string(),
        })
    }
}

fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = i32::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid signals the process group
            // led by our own child; it touches no memory.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
