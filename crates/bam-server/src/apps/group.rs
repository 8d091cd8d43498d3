//! Supervised group of OS processes sharing one lifetime
//!
//! Every Procfile command runs under `sh -c` as the leader of its own
//! process group, so signals reach whatever the shell spawned. A member
//! counts as alive while its leader runs or anything is left in its group.
//! Output lines are copied to our stdout/stderr tagged with `[app:process] `.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use bam_core::AppError;

/// How often a stopping group is checked for survivors
const STOP_POLL: Duration = Duration::from_millis(50);

/// One spawned Procfile entry
struct Member {
    label: String,
    child: Child,
    /// Process group id, recorded at spawn since the leader may be reaped first
    pgid: Option<u32>,
}

impl Member {
    fn is_alive(&mut self) -> bool {
        // try_wait reaps an exited leader so it no longer counts in the group
        let leader_running = matches!(self.child.try_wait(), Ok(None));
        leader_running || group_alive(self.pgid)
    }
}

/// Processes started together by one `ProcessApp::start` call
pub struct ProcessGroup {
    port: u16,
    members: Vec<Member>,
}

/// How a process should be launched
pub struct Launch<'a> {
    /// App name used in the output prefix
    pub app: &'a str,
    pub dir: &'a Path,
    /// Extra variables on top of the inherited environment
    pub env: &'a [(String, String)],
    pub port: u16,
}

impl ProcessGroup {
    /// Spawn one process per `label -> command`
    ///
    /// If any spawn fails, the processes already started are killed before
    /// the error is returned.
    pub async fn spawn(
        launch: &Launch<'_>,
        processes: &BTreeMap<String, String>,
    ) -> Result<Self, AppError> {
        let mut group = Self {
            port: launch.port,
            members: Vec::with_capacity(processes.len()),
        };

        for (label, command) in processes {
            match spawn_one(launch, label, command) {
                Ok(child) => {
                    tracing::debug!(
                        "Spawned {}:{} (pid {:?}) on port {}",
                        launch.app,
                        label,
                        child.id(),
                        launch.port
                    );
                    let pgid = child.id();
                    group.members.push(Member {
                        label: label.clone(),
                        child,
                        pgid,
                    });
                }
                Err(source) => {
                    tracing::warn!("Failed to spawn {}:{}: {}", launch.app, label, source);
                    group.kill().await;
                    return Err(AppError::Spawn {
                        process: label.clone(),
                        source,
                    });
                }
            }
        }

        Ok(group)
    }

    /// Port handed to every member through `PORT`
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether at least one member is still alive
    pub fn is_alive(&mut self) -> bool {
        self.members.iter_mut().any(Member::is_alive)
    }

    /// Terminate every member
    ///
    /// Sends SIGTERM to each member's process group and waits up to `grace`
    /// for every group to empty, then SIGKILLs whatever is left. Survivors
    /// whose shell already exited are killed too.
    pub async fn stop(mut self, grace: Duration) -> Result<(), AppError> {
        let mut first_error = None;
        for member in &mut self.members {
            if let Err(e) = terminate(member) {
                tracing::warn!("Failed to signal {}: {}", member.label, e);
                first_error.get_or_insert(e);
            }
        }

        let deadline = Instant::now() + grace;
        while self.is_alive() {
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Processes still alive after {:?}, sending SIGKILL",
                    grace
                );
                self.kill().await;
                break;
            }
            tokio::time::sleep(STOP_POLL.min(deadline - now)).await;
        }

        match first_error {
            Some(e) => Err(AppError::Io(e)),
            None => Ok(()),
        }
    }

    /// SIGKILL every member's group and reap the leaders
    async fn kill(&mut self) {
        for member in &mut self.members {
            force_kill(member);
            let _ = member.child.wait().await;
        }
    }
}

fn spawn_one(launch: &Launch<'_>, label: &str, command: &str) -> std::io::Result<Child> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(launch.dir)
        .envs(launch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .env("PORT", launch.port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;

    let prefix = format!("[{}:{}] ", launch.app, label);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(copy_prefixed(stdout, tokio::io::stdout(), prefix.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(copy_prefixed(stderr, tokio::io::stderr(), prefix));
    }

    Ok(child)
}

/// Copy `src` to `dst` line by line, prepending `prefix`
async fn copy_prefixed<R, W>(src: R, mut dst: W, prefix: String)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(src).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let tagged = format!("{}{}\n", prefix, line);
        if dst.write_all(tagged.as_bytes()).await.is_err() {
            break;
        }
        let _ = dst.flush().await;
    }
}

#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: libc::c_int) -> std::io::Result<()> {
    let Some(pgid) = pgid else {
        return Ok(());
    };
    // Negative pid addresses the whole process group
    let result = unsafe { libc::kill(-(pgid as libc::pid_t), signal) };
    if result == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Whether any process is left in the group
#[cfg(unix)]
fn group_alive(pgid: Option<u32>) -> bool {
    let Some(pgid) = pgid else {
        return false;
    };
    let result = unsafe { libc::kill(-(pgid as libc::pid_t), 0) };
    result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn group_alive(_pgid: Option<u32>) -> bool {
    false
}

#[cfg(unix)]
fn terminate(member: &mut Member) -> std::io::Result<()> {
    signal_group(member.pgid, libc::SIGTERM)
}

#[cfg(not(unix))]
fn terminate(member: &mut Member) -> std::io::Result<()> {
    member.child.start_kill()
}

#[cfg(unix)]
fn force_kill(member: &mut Member) {
    let _ = signal_group(member.pgid, libc::SIGKILL);
    let _ = member.child.start_kill();
}

#[cfg(not(unix))]
fn force_kill(member: &mut Member) {
    let _ = member.child.start_kill();
}
