use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Drop control characters so external text is safe to place in a single
/// header or log line.
pub fn strip_control_chars(input: &str) -> String {
    input.chars().filter(|c| !c.is_control()).collect()
}

pub fn pid_alive(pid: u32) -> bool {
    let Ok(status) = Command::new("kill").arg("-0").arg(pid.to_string()).status() else {
        return false;
    };
    status.success()
}

fn ps_field(pid: u32, field: &str) -> Result<Option<String>> {
    let out = Command::new("ps")
        .arg("-p")
        .arg(pid.to_string())
        .arg("-o")
        .arg(format!("{field}="))
        .output()
        .with_context(|| format!("failed to inspect pid {pid} with `ps -o {field}`"))?;
    if !out.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
}

/// Like [`pid_alive`], but a zombie awaiting its parent counts as gone.
pub fn process_running(pid: u32) -> Result<bool> {
    if !pid_alive(pid) {
        return Ok(false);
    }
    Ok(ps_field(pid, "stat")?.is_some_and(|stat| !stat.starts_with('Z')))
}

/// Full command line of `pid`, empty when it cannot be read.
pub fn process_command_line(pid: u32) -> Result<String> {
    Ok(ps_field(pid, "command")?.unwrap_or_default())
}

pub fn terminate(pid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .context("failed to send SIGTERM with `kill -TERM`")?;
    if status.success() || !process_running(pid)? {
        return Ok(());
    }
    anyhow::bail!("`kill -TERM {pid}` failed and process is still alive")
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_pipe<T>(handle: JoinHandle<T>, name: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("command {name} reader panicked"))
}

/// Run `cmd` with `input` on stdin, killing it once `timeout_secs` elapses.
/// Stdin, stdout and stderr are serviced on their own threads so a chatty
/// child never stalls on a full pipe.
pub fn run_command_with_input(
    cmd: &mut Command,
    input: &[u8],
    timeout_secs: Option<u64>,
) -> Result<Output> {
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().context("failed to spawn command")?;

    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        thread::spawn(move || stdin.write_all(&input))
    });
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = timeout_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("command timed out after {}s", timeout_secs.unwrap_or_default());
        }
        thread::sleep(Duration::from_millis(50));
    };

    if let Some(writer) = writer {
        match join_pipe(writer, "stdin")? {
            Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                return Err(err).context("failed to write command stdin");
            }
            _ => {}
        }
    }
    Ok(Output {
        status,
        stdout: join_pipe(stdout, "stdout")?,
        stderr: join_pipe(stderr, "stderr")?,
    })
}
