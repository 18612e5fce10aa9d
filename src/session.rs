//! Session attachment protocol
//!
//! How an invocation reaches a shell or command inside a running
//! environment. The decision is a pure plan over (startup command,
//! persistence, terminal state, whether a session already exists); the
//! executor replays the plan's steps through the runtime. Persistent
//! sessions live in a tmux session named `fdevc` inside the environment,
//! so they survive the client detaching.

use crate::config::EffectiveConfig;
use crate::error::{FdevcError, Result};
use crate::identity::EnvId;
use crate::runtime::ContainerRuntime;

/// Fixed multiplexer session name inside every environment.
pub const SESSION_NAME: &str = "fdevc";

/// One step of an attach plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Captured exec; output is echoed, a nonzero exit fails the attach.
    Batch(Vec<String>),
    /// Foreground exec with the caller's terminal.
    Interactive(Vec<String>),
}

#[derive(Debug, Clone, Copy)]
pub struct AttachRequest<'a> {
    pub startup_cmd: Option<&'a str>,
    pub persist: bool,
    /// A session-variant startup command was supplied this invocation, so
    /// reattaching should replay it.
    pub run_on_reattach: bool,
    pub detach_requested: bool,
    /// Whether stdin and stdout are a terminal.
    pub interactive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachPlan {
    pub steps: Vec<Step>,
    /// Stop the environment once the plan has run to completion.
    pub stop_after: bool,
    /// Explanation printed when no shell is attached.
    pub note: Option<String>,
}

/// Decide the attach steps for one invocation.
///
/// Detach requests skip attaching entirely and never stop anything.
/// Without a terminal the startup command runs once non-interactively.
/// With a terminal, persistent mode rides the tmux session (created on
/// first use, reattached afterwards); non-persistent mode attaches
/// directly, except that an existing persistent session is reattached
/// with its exit semantics overridden so leaving it also ends it.
pub fn plan(request: &AttachRequest, session_exists: bool) -> AttachPlan {
    let mut plan = AttachPlan::default();

    if request.detach_requested {
        plan.note = Some("Environment is up; not attaching".to_string());
        return plan;
    }

    if !request.interactive {
        match request.startup_cmd {
            Some(cmd) => {
                plan.steps.push(Step::Batch(shell_command(cmd)));
                plan.stop_after = !request.persist;
            }
            None => {
                plan.note = Some("No interactive terminal; skipping attach".to_string());
            }
        }
        return plan;
    }

    if request.persist {
        if session_exists {
            if request.run_on_reattach {
                if let Some(cmd) = request.startup_cmd {
                    plan.steps.push(Step::Batch(send_startup(cmd)));
                }
            }
        } else {
            plan.steps
                .push(Step::Batch(tmux(&["new-session", "-d", "-s", SESSION_NAME])));
            if let Some(cmd) = request.startup_cmd {
                plan.steps.push(Step::Batch(send_startup(cmd)));
            }
        }
        plan.steps
            .push(Step::Interactive(tmux(&["attach-session", "-t", SESSION_NAME])));
        return plan;
    }

    if session_exists {
        // The override must land before the attach so that exiting the
        // reattached session also destroys it.
        plan.steps.push(Step::Batch(tmux(&[
            "set-option",
            "-t",
            SESSION_NAME,
            "destroy-unattached",
            "on",
        ])));
        plan.steps
            .push(Step::Interactive(tmux(&["attach-session", "-t", SESSION_NAME])));
    } else {
        if let Some(cmd) = request.startup_cmd {
            plan.steps.push(Step::Interactive(shell_command(cmd)));
        }
        plan.steps.push(Step::Interactive(login_shell()));
    }
    plan.stop_after = true;
    plan
}

/// Probe for a live `fdevc` session inside the environment. Any failure
/// (including tmux not being installed) counts as "no session".
pub fn session_exists(runtime: &dyn ContainerRuntime, id: &EnvId, dir: &str) -> bool {
    let probe = tmux(&["has-session", "-t", SESSION_NAME]);
    runtime
        .exec_batch(id.as_str(), dir, &probe)
        .map(|out| out.success())
        .unwrap_or(false)
}

/// Replay a plan's steps inside the environment.
pub fn run(
    runtime: &dyn ContainerRuntime,
    id: &EnvId,
    config: &EffectiveConfig,
    plan: &AttachPlan,
) -> Result<()> {
    if let Some(note) = &plan.note {
        println!("{}", note);
    }
    let dir = config.exec_dir();
    for step in &plan.steps {
        match step {
            Step::Batch(cmd) => {
                let out = runtime
                    .exec_batch(id.as_str(), &dir, cmd)
                    .map_err(|e| attach_error(id, e))?;
                if !out.stdout.is_empty() {
                    print!("{}", out.stdout);
                }
                if !out.stderr.is_empty() {
                    eprint!("{}", out.stderr);
                }
                if !out.success() {
                    return Err(FdevcError::AttachFailed {
                        name: id.short().to_string(),
                        detail: format!("'{}' exited with status {}", cmd.join(" "), out.status),
                    });
                }
            }
            Step::Interactive(cmd) => {
                runtime
                    .exec_interactive(id.as_str(), &dir, cmd)
                    .map_err(|e| attach_error(id, e))?;
            }
        }
    }
    Ok(())
}

fn attach_error(id: &EnvId, err: FdevcError) -> FdevcError {
    match err {
        FdevcError::RuntimeUnavailable(_) | FdevcError::AttachFailed { .. } => err,
        other => FdevcError::AttachFailed {
            name: id.short().to_string(),
            detail: other.to_string(),
        },
    }
}

fn shell_command(cmd: &str) -> Vec<String> {
    vec!["sh".to_string(), "-lc".to_string(), cmd.to_string()]
}

fn login_shell() -> Vec<String> {
    vec!["sh".to_string(), "-l".to_string()]
}

fn tmux(args: &[&str]) -> Vec<String> {
    let mut cmd = vec!["tmux".to_string()];
    cmd.extend(args.iter().map(|s| s.to_string()));
    cmd
}

fn send_startup(cmd: &str) -> Vec<String> {
    vec![
        "tmux".to_string(),
        "send-keys".to_string(),
        "-t".to_string(),
        SESSION_NAME.to_string(),
        cmd.to_string(),
        "Enter".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageSource;
    use crate::runtime::mock::MockRuntime;
    use std::path::PathBuf;

    fn request(startup: Option<&'static str>, persist: bool) -> AttachRequest<'static> {
        AttachRequest {
            startup_cmd: startup,
            persist,
            run_on_reattach: false,
            detach_requested: false,
            interactive: true,
        }
    }

    fn config() -> EffectiveConfig {
        EffectiveConfig {
            ports: vec![],
            image: ImageSource::Registry("debian:stable-slim".to_string()),
            runtime_cmd: vec!["docker".to_string()],
            project_path: Some(PathBuf::from("/home/u/proj")),
            startup_cmd: None,
            socket_enabled: true,
            persist: false,
            volumes: vec![],
        }
    }

    #[test]
    fn test_detach_skips_attach() {
        let mut req = request(Some("npm start"), true);
        req.detach_requested = true;
        let plan = plan(&req, true);
        assert!(plan.steps.is_empty());
        assert!(!plan.stop_after);
        assert!(plan.note.is_some());
    }

    #[test]
    fn test_no_terminal_runs_startup_once() {
        let mut req = request(Some("make test"), false);
        req.interactive = false;
        let p = plan(&req, false);
        assert_eq!(
            p.steps,
            vec![Step::Batch(vec![
                "sh".to_string(),
                "-lc".to_string(),
                "make test".to_string()
            ])]
        );
        assert!(p.stop_after);

        let mut persistent = request(Some("make test"), true);
        persistent.interactive = false;
        assert!(!plan(&persistent, false).stop_after);
    }

    #[test]
    fn test_no_terminal_without_startup_skips() {
        let mut req = request(None, false);
        req.interactive = false;
        let p = plan(&req, false);
        assert!(p.steps.is_empty());
        assert!(p.note.is_some());
        assert!(!p.stop_after);
    }

    #[test]
    fn test_persistent_first_attach_creates_session() {
        let p = plan(&request(Some("npm start"), true), false);
        assert_eq!(
            p.steps,
            vec![
                Step::Batch(tmux(&["new-session", "-d", "-s", "fdevc"])),
                Step::Batch(send_startup("npm start")),
                Step::Interactive(tmux(&["attach-session", "-t", "fdevc"])),
            ]
        );
        assert!(!p.stop_after);
    }

    #[test]
    fn test_persistent_reattach_replays_only_on_request() {
        let quiet = plan(&request(Some("npm start"), true), true);
        assert_eq!(
            quiet.steps,
            vec![Step::Interactive(tmux(&["attach-session", "-t", "fdevc"]))]
        );

        let mut req = request(Some("npm start"), true);
        req.run_on_reattach = true;
        let replayed = plan(&req, true);
        assert_eq!(replayed.steps[0], Step::Batch(send_startup("npm start")));
    }

    #[test]
    fn test_exit_override_is_issued_before_reattach() {
        let p = plan(&request(None, false), true);
        assert_eq!(
            p.steps,
            vec![
                Step::Batch(tmux(&[
                    "set-option",
                    "-t",
                    "fdevc",
                    "destroy-unattached",
                    "on"
                ])),
                Step::Interactive(tmux(&["attach-session", "-t", "fdevc"])),
            ]
        );
        assert!(p.stop_after);
    }

    #[test]
    fn test_direct_attach_runs_startup_then_shell() {
        let p = plan(&request(Some("npm start"), false), false);
        assert_eq!(
            p.steps,
            vec![
                Step::Interactive(vec![
                    "sh".to_string(),
                    "-lc".to_string(),
                    "npm start".to_string()
                ]),
                Step::Interactive(vec!["sh".to_string(), "-l".to_string()]),
            ]
        );
        assert!(p.stop_after);
    }

    #[test]
    fn test_session_probe_tolerates_missing_tmux() {
        let runtime =
            MockRuntime::new().with_batch_status("tmux has-session -t fdevc", 1);
        let id = EnvId::named("proj");
        assert!(!session_exists(&runtime, &id, "/workspace/proj"));

        let present = MockRuntime::new();
        assert!(session_exists(&present, &id, "/workspace/proj"));
    }

    #[test]
    fn test_run_replays_steps_in_order() {
        let runtime = MockRuntime::new().with_container("fdevc.proj", true);
        let id = EnvId::named("proj");
        let p = plan(&request(None, false), true);
        run(&runtime, &id, &config(), &p).unwrap();
        let log = runtime.call_log();
        assert_eq!(
            log,
            vec![
                "exec fdevc.proj /workspace/proj tmux set-option -t fdevc destroy-unattached on"
                    .to_string(),
                "exec-it fdevc.proj /workspace/proj tmux attach-session -t fdevc".to_string(),
            ]
        );
    }

    #[test]
    fn test_failed_batch_step_reports_attach_failure() {
        let runtime = MockRuntime::new()
            .with_container("fdevc.proj", true)
            .with_batch_status("tmux new-session -d -s fdevc", 1);
        let id = EnvId::named("proj");
        let p = plan(&request(None, true), false);
        let err = run(&runtime, &id, &config(), &p).unwrap_err();
        assert!(matches!(err, FdevcError::AttachFailed { .. }));
    }
}
