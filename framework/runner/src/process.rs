//! The seam between a run and the engine process executing it.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

use crate::command::EngineCommand;
use crate::error::{LifecycleError, LifecycleResult};
use crate::jmeter_binary::jmeter_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// The exit code is `None` when the process was ended by a signal.
    Exited { code: Option<i32> },
}

/// A launched engine process.
pub trait EngineProcess: Send + std::fmt::Debug {
    fn id(&self) -> u32;

    /// Check for exit without blocking.
    fn status(&mut self) -> io::Result<ProcessStatus>;

    /// Ask the process to stop, giving it the chance to flush its output.
    fn terminate(&mut self) -> io::Result<()>;

    /// Stop the process immediately.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts engine processes.
pub trait EngineLauncher: Send {
    fn launch(&self, command: &EngineCommand) -> LifecycleResult<Box<dyn EngineProcess>>;
}

/// Launches the JMeter binary found by [jmeter_path], or an explicit program.
#[derive(Debug, Clone, Default)]
pub struct JMeterLauncher {
    program: Option<PathBuf>,
    inherit_output: bool,
}

impl JMeterLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `program` instead of looking up JMeter.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Let the engine write to this process's stdout and stderr. Discarded otherwise.
    pub fn with_inherited_output(mut self, inherit_output: bool) -> Self {
        self.inherit_output = inherit_output;
        self
    }

    fn program(&self) -> LifecycleResult<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => jmeter_path().map_err(|e| LifecycleError::launch(format!("{e:#}"))),
        }
    }
}

impl EngineLauncher for JMeterLauncher {
    fn launch(&self, command: &EngineCommand) -> LifecycleResult<Box<dyn EngineProcess>> {
        let program = self.program()?;
        log::info!(
            "Starting engine: {}",
            command.display(&program.to_string_lossy())
        );

        let output = || {
            if self.inherit_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };
        let child = Command::new(&program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .spawn()
            .map_err(|e| {
                LifecycleError::launch(format!("could not start {}: {e}", program.display()))
            })?;

        log::debug!("Engine started with pid {}", child.id());
        Ok(Box::new(ChildProcess { child }))
    }
}

#[derive(Debug)]
struct ChildProcess {
    child: Child,
}

impl EngineProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn status(&mut self) -> io::Result<ProcessStatus> {
        Ok(match self.child.try_wait()? {
            Some(status) => ProcessStatus::Exited {
                code: status.code(),
            },
            None => ProcessStatus::Running,
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        let pid = Pid::from_u32(self.child.id());
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let Some(process) = system.process(pid) else {
            log::debug!("Engine process {pid} already gone");
            return Ok(());
        };

        match process.kill_with(Signal::Term) {
            Some(true) => {
                log::debug!("Sent SIGTERM to engine process {pid}");
                Ok(())
            }
            Some(false) => Err(io::Error::other(format!(
                "failed to send SIGTERM to engine process {pid}"
            ))),
            None => {
                log::debug!("SIGTERM is not supported on this platform, killing {pid}");
                self.kill()
            }
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// What happened to the processes a [FakeLauncher] handed out.
    #[derive(Debug, Default)]
    pub(crate) struct FakeEngine {
        pub status: Option<ProcessStatus>,
        pub launched: Vec<EngineCommand>,
        pub terminated: usize,
        pub killed: usize,
        pub fail_launch: bool,
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeLauncher {
        pub engine: Arc<Mutex<FakeEngine>>,
    }

    impl FakeLauncher {
        pub(crate) fn exit(&self, code: Option<i32>) {
            self.engine.lock().status = Some(ProcessStatus::Exited { code });
        }
    }

    impl EngineLauncher for FakeLauncher {
        fn launch(&self, command: &EngineCommand) -> LifecycleResult<Box<dyn EngineProcess>> {
            let mut engine = self.engine.lock();
            if engine.fail_launch {
                return Err(LifecycleError::launch("no such file"));
            }
            engine.launched.push(command.clone());
            engine.status = Some(ProcessStatus::Running);
            Ok(Box::new(FakeProcess {
                engine: self.engine.clone(),
            }))
        }
    }

    #[derive(Debug)]
    struct FakeProcess {
        engine: Arc<Mutex<FakeEngine>>,
    }

    impl EngineProcess for FakeProcess {
        fn id(&self) -> u32 {
            4242
        }

        fn status(&mut self) -> io::Result<ProcessStatus> {
            Ok(self.engine.lock().status.unwrap_or(ProcessStatus::Running))
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.engine.lock().terminated += 1;
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            let mut engine = self.engine.lock();
            engine.killed += 1;
            engine.status = Some(ProcessStatus::Exited { code: None });
            Ok(())
        }
    }
}
