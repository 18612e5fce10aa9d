//! Runtime adapter over the docker/podman command line

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{FdevcError, Result};
use crate::runtime::{ContainerInfo, ContainerRuntime, CreateSpec, ExecOutput};

/// Field separator for `ps --format` rows; container names cannot contain it.
const FIELD_SEP: &str = "|||";

const LIST_FORMAT: &str =
    "{{.Names}}|||{{.Status}}|||{{.Image}}|||{{.Mounts}}|||{{.Labels}}|||{{.CreatedAt}}|||{{.Ports}}";

/// Drives a real container runtime through its CLI. The invocation prefix
/// may be multi-token (`sudo podman`).
pub struct CliRuntime {
    program: String,
    prefix_args: Vec<String>,
}

impl CliRuntime {
    pub fn new(cmd: &[String]) -> Self {
        let mut tokens = cmd.iter().filter(|t| !t.is_empty());
        let program = tokens
            .next()
            .cloned()
            .unwrap_or_else(|| "docker".to_string());
        CliRuntime {
            program,
            prefix_args: tokens.cloned().collect(),
        }
    }

    /// The invocation as the user would type it, for error messages.
    pub fn display_name(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.prefix_args.iter().cloned());
        parts.join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> FdevcError {
        if e.kind() == ErrorKind::NotFound {
            FdevcError::RuntimeUnavailable(self.display_name())
        } else {
            e.into()
        }
    }

    /// Run with captured output.
    fn output<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.command()
            .args(args)
            .output()
            .map_err(|e| self.spawn_error(e))
    }

    /// Run with the caller's stdio attached.
    fn status<I, S>(&self, args: I) -> Result<std::process::ExitStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.command()
            .args(args)
            .status()
            .map_err(|e| self.spawn_error(e))
    }
}

fn transition_error(action: &'static str, name: &str, output: &Output) -> FdevcError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let detail = if stderr.is_empty() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            format!("exit status {}", output.status.code().unwrap_or(-1))
        } else {
            stdout
        }
    } else {
        stderr
    };
    FdevcError::TransitionFailed {
        action,
        name: name.to_string(),
        detail,
        conflict: None,
    }
}

/// Parse one `ps --format` row.
fn parse_row(line: &str) -> Option<ContainerInfo> {
    let mut fields = line.split(FIELD_SEP);
    let name = fields.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let field = |v: Option<&str>| v.unwrap_or("").trim().to_string();
    let status = field(fields.next());
    let image = field(fields.next());
    let mounts = field(fields.next());
    let labels = field(fields.next());
    let created_at = field(fields.next());
    let ports = field(fields.next());

    Some(ContainerInfo {
        name: name.to_string(),
        status,
        image,
        mounts: split_list(&mounts),
        labels: labels
            .split(',')
            .filter_map(|kv| {
                let (k, v) = kv.split_once('=')?;
                Some((k.trim().to_string(), v.trim().to_string()))
            })
            .collect(),
        created_at,
        ports,
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flag layout for `create`, separated out so it can be checked directly.
fn create_args(spec: &CreateSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(port.clone());
    }
    for (source, target) in &spec.mounts {
        args.push("-v".to_string());
        args.push(format!("{}:{}", source, target));
    }
    for path in &spec.anonymous_volumes {
        args.push("-v".to_string());
        args.push(path.clone());
    }
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    if let Some(dir) = &spec.workdir {
        args.push("-w".to_string());
        args.push(dir.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

impl ContainerRuntime for CliRuntime {
    fn available(&self) -> bool {
        self.command()
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn list(&self, name_prefix: &str) -> Result<Vec<ContainerInfo>> {
        let output = self.output([
            "ps",
            "-a",
            "--no-trunc",
            "--filter",
            &format!("name={}", name_prefix),
            "--format",
            LIST_FORMAT,
        ])?;
        if !output.status.success() {
            return Err(transition_error("list", name_prefix, &output));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().filter_map(parse_row).collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let output = self.output(["inspect", "--type", "container", "-f", "{{.Name}}", name])?;
        Ok(output.status.success())
    }

    fn running(&self, name: &str) -> Result<bool> {
        let output = self.output(["inspect", "-f", "{{.State.Running}}", name])?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    fn create(&self, spec: &CreateSpec) -> Result<()> {
        let output = self.output(create_args(spec))?;
        if !output.status.success() {
            return Err(transition_error("create", &spec.name, &output));
        }
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        let output = self.output(["start", name])?;
        if !output.status.success() {
            return Err(transition_error("start", name, &output));
        }
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        let output = self.output(["stop", name])?;
        if !output.status.success() {
            return Err(transition_error("stop", name, &output));
        }
        Ok(())
    }

    fn remove(&self, name: &str, volumes_too: bool) -> Result<()> {
        let mut args = vec!["rm", "-f"];
        if volumes_too {
            args.push("-v");
        }
        args.push(name);
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(transition_error("remove", name, &output));
        }
        Ok(())
    }

    fn exec_interactive(&self, name: &str, dir: &str, command: &[String]) -> Result<()> {
        let mut args = vec![
            "exec".to_string(),
            "-it".to_string(),
            "-w".to_string(),
            dir.to_string(),
            name.to_string(),
        ];
        args.extend(command.iter().cloned());
        // The user's shell owns the exit status; only a spawn failure is ours.
        self.status(args)?;
        Ok(())
    }

    fn exec_batch(&self, name: &str, dir: &str, command: &[String]) -> Result<ExecOutput> {
        let mut args = vec![
            "exec".to_string(),
            "-w".to_string(),
            dir.to_string(),
            name.to_string(),
        ];
        args.extend(command.iter().cloned());
        let output = self.output(args)?;
        Ok(ExecOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn created_at(&self, name: &str) -> Result<String> {
        let output = self.output(["inspect", "-f", "{{.Created}}", name])?;
        if !output.status.success() {
            return Err(transition_error("inspect", name, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn build_image(&self, recipe: &Path, context_dir: &Path, tag: &str) -> Result<()> {
        let status = self.status([
            "build".as_ref(),
            "-f".as_ref(),
            recipe.as_os_str(),
            "-t".as_ref(),
            tag.as_ref(),
            context_dir.as_os_str(),
        ])?;
        if !status.success() {
            return Err(FdevcError::TransitionFailed {
                action: "build image",
                name: tag.to_string(),
                detail: format!("build exited with status {}", status.code().unwrap_or(-1)),
                conflict: None,
            });
        }
        Ok(())
    }

    fn image_exists(&self, tag: &str) -> Result<bool> {
        let output = self.output(["image", "inspect", tag])?;
        Ok(output.status.success())
    }

    fn remove_image(&self, tag: &str) -> Result<()> {
        let output = self.output(["rmi", tag])?;
        if !output.status.success() {
            return Err(transition_error("remove image", tag, &output));
        }
        Ok(())
    }
}
