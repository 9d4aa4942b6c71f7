use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::Command,
};
use tracing::{debug, trace};

use crate::error::{ExecError, ExecResult};

/// A single program invocation.
#[derive(Clone, Debug)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Return an error when the exit code is not zero.
    pub fail_on_non_zero: bool,
}

impl ProcConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            fail_on_non_zero: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.fail_on_non_zero = false;
        self
    }

    /// `program arg1 arg2 …`, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ExecError {
        ExecError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        }
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone)]
pub struct ProcOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `cfg` to completion, collecting stdout and stderr.
///
/// Stdout lines are also traced as they arrive so long builds can be followed with a verbose filter.
pub async fn run(cfg: &ProcConfig) -> ExecResult<ProcOutput> {
    trace!(target: "ngl.exec.proc", command = %cfg.display(), "spawn");

    let mut cmd = cfg.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| cfg.spawn_error(e))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::join!(follow_lines(stdout), read_all(stderr));
    let status = child.wait().await?;

    let out = ProcOutput {
        code: status.code(),
        stdout,
        stderr,
    };
    if cfg.fail_on_non_zero && !status.success() {
        debug!(target: "ngl.exec.proc", command = %cfg.display(), code = ?out.code, "exit non-zero");
        return Err(non_zero(cfg, status, &out.stderr));
    }
    Ok(out)
}

/// Run `producer | consumer`, optionally sending the consumer's stdout into `sink`.
pub async fn pipe(
    producer: &ProcConfig,
    consumer: &ProcConfig,
    sink: Option<&Path>,
) -> ExecResult<()> {
    trace!(
        target: "ngl.exec.proc",
        producer = %producer.display(),
        consumer = %consumer.display(),
        "spawn pipe"
    );

    let mut up = producer.command();
    up.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut up = up.spawn().map_err(|e| producer.spawn_error(e))?;

    let mut down = consumer.command();
    down.stdin(Stdio::piped()).stderr(Stdio::piped());
    match sink {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            down.stdout(Stdio::from(file));
        }
        None => {
            down.stdout(Stdio::null());
        }
    }
    let mut down = down.spawn().map_err(|e| consumer.spawn_error(e))?;

    let (Some(mut from), Some(mut into)) = (up.stdout.take(), down.stdin.take()) else {
        return Err(ExecError::Io("pipe handles unavailable".into()));
    };
    let copy = async move {
        let copied = tokio::io::copy(&mut from, &mut into).await;
        drop(into);
        copied
    };
    let (copied, up_err, down_err) =
        tokio::join!(copy, read_all(up.stderr.take()), read_all(down.stderr.take()));

    let up_status = up.wait().await?;
    let down_status = down.wait().await?;
    if !up_status.success() {
        return Err(non_zero(producer, up_status, &up_err));
    }
    if !down_status.success() {
        return Err(non_zero(consumer, down_status, &down_err));
    }
    let bytes = copied?;
    debug!(target: "ngl.exec.proc", bytes, "pipe finished");
    Ok(())
}

fn non_zero(cfg: &ProcConfig, status: ExitStatus, stderr: &str) -> ExecError {
    let status = match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    };
    ExecError::NonZeroExit {
        command: cfg.display(),
        status,
        stderr: stderr.trim().to_string(),
    }
}

async fn follow_lines<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut collected = String::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(target: "ngl.exec.proc.out", %line);
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_string(&mut buf).await;
    }
    buf
}

pub mod shell;
