//! Interactive session driver.
//!
//! One call drives one PTY session from connect to teardown:
//!
//! ```text
//! Connecting -> BannerDrain -> BootstrapRun -> BootstrapWait
//!            -> CommandRun -> CommandWait -> Done
//! ```
//!
//! The bootstrap step activates the remote toolchain in the shell itself, so
//! its effects (PATH, loaded modules) are only visible to statements sent
//! later on the same channel. Completion of each step is detected with a
//! unique [`Marker`] printed by the shell after the step returns.
//!
//! A slow bootstrap is not fatal: the command still runs and the bootstrap
//! output is flagged best-effort. A command that never prints its marker is
//! reported with `timed_out` and whatever output arrived. The connection is
//! closed on every path.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::framer::{Frame, Framer, strip_control_sequences};
use super::marker::{Marker, MarkerKind};
use crate::mcp::error::RemoteError;
use crate::mcp::transport::{
    Connection, InteractiveChannel, RemoteTarget, TerminalGeometry, Transport,
};

/// Prefix of the exit-status line printed after the caller's command.
pub const EXIT_CODE_TOKEN: &str = "EXIT_CODE:";

/// Statements run before activation. Echo is disabled so later input lines
/// are not reflected into the command output; prompts are emptied for the
/// same reason.
const QUIET_SHELL: &str = "stty -echo 2>/dev/null; PS1=''; PS2='';";

/// Everything one session needs, fixed before connecting.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub command: String,
    /// Shell text that activates the remote environment.
    pub activation: Option<String>,
    /// Human-readable name of the environment, for the output label.
    pub label: Option<String>,
    pub geometry: TerminalGeometry,
    pub connect_timeout: Duration,
    pub banner_settle: Duration,
    pub bootstrap_timeout: Duration,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub bootstrap_marker: Marker,
    pub command_marker: Marker,
}

impl SessionPlan {
    /// A plan with default geometry and timeouts and fresh markers.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            activation: None,
            label: None,
            geometry: TerminalGeometry::default(),
            connect_timeout: Duration::from_secs(30),
            banner_settle: Duration::from_millis(2000),
            bootstrap_timeout: Duration::from_secs(90),
            command_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(100),
            bootstrap_marker: Marker::new(MarkerKind::Bootstrap),
            command_marker: Marker::new(MarkerKind::Command),
        }
    }

    /// Input line for the bootstrap step.
    pub fn bootstrap_line(&self) -> String {
        let emit = self.bootstrap_marker.emit_statement();
        match self
            .activation
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            Some(activation) => format!("{} {} 2>&1; {}\n", QUIET_SHELL, activation, emit),
            None => format!("{} {}\n", QUIET_SHELL, emit),
        }
    }

    /// Input line for the command step. `$?` is read immediately after the
    /// caller's command so housekeeping statements cannot replace it.
    pub fn command_line(&self) -> String {
        let command = self.command.trim().trim_end_matches(';').trim_end();
        format!(
            "{} 2>&1; printf '\\n{}%s\\n' \"$?\"; {}\n",
            command,
            EXIT_CODE_TOKEN,
            self.command_marker.emit_statement()
        )
    }
}

/// Shell state produced by the bootstrap phase and handed to the command
/// phase. Exists only for the lifetime of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnvironment {
    pub label: Option<String>,
    pub activation: Option<String>,
    /// Cleaned bootstrap output.
    pub output: String,
    /// The bootstrap marker arrived before its deadline.
    pub ready: bool,
    pub bootstrap_timeout: Duration,
}

/// Outcome of one remote command run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub environment: SessionEnvironment,
    pub command_output: String,
    /// Absent when no valid exit-status line was seen. Never guessed.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// The remote shell closed the stream before the command marker.
    pub stream_closed: bool,
    pub command_timeout: Duration,
}

impl SessionResult {
    pub fn bootstrap_output(&self) -> &str {
        &self.environment.output
    }

    pub fn bootstrap_timed_out(&self) -> bool {
        !self.environment.ready
    }
}

/// Driver states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    BannerDrain,
    BootstrapRun,
    BootstrapWait,
    CommandRun,
    CommandWait,
    Done(Completion),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    Timeout,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::BannerDrain => write!(f, "BannerDrain"),
            SessionState::BootstrapRun => write!(f, "BootstrapRun"),
            SessionState::BootstrapWait => write!(f, "BootstrapWait"),
            SessionState::CommandRun => write!(f, "CommandRun"),
            SessionState::CommandWait => write!(f, "CommandWait"),
            SessionState::Done(Completion::Success) => write!(f, "Done(success)"),
            SessionState::Done(Completion::Timeout) => write!(f, "Done(timeout)"),
            SessionState::Done(Completion::Error) => write!(f, "Done(error)"),
        }
    }
}

struct StateTracker {
    current: SessionState,
}

impl StateTracker {
    fn new() -> Self {
        debug!("session state: {}", SessionState::Connecting);
        Self {
            current: SessionState::Connecting,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug!("session state: {} -> {}", self.current, next);
        self.current = next;
    }
}

/// Run `plan.command` in a fresh interactive session on `target`.
///
/// Errors are transport failures (connect, authenticate, open, send). Slow
/// bootstrap and command timeouts are part of a successful result.
pub async fn run_remote_command<T: Transport>(
    transport: &T,
    target: &RemoteTarget,
    plan: &SessionPlan,
) -> Result<SessionResult, RemoteError> {
    let mut states = StateTracker::new();
    info!("Running remote command on {}: {}", target.display(), plan.command);

    let mut connection = match transport.connect(target, plan.connect_timeout).await {
        Ok(connection) => connection,
        Err(e) => {
            states.advance(SessionState::Done(Completion::Error));
            return Err(e);
        }
    };

    let outcome = drive(&mut connection, plan, &mut states).await;
    connection.close().await;

    match &outcome {
        Ok(result) if result.timed_out => {
            states.advance(SessionState::Done(Completion::Timeout));
            warn!(
                "Remote command timed out after {}s",
                plan.command_timeout.as_secs()
            );
        }
        Ok(result) => {
            states.advance(SessionState::Done(Completion::Success));
            info!("Remote command finished with exit code {:?}", result.exit_code);
        }
        Err(e) => {
            states.advance(SessionState::Done(Completion::Error));
            warn!("Remote command failed: {}", e);
        }
    }
    outcome
}

async fn drive<C: Connection>(
    connection: &mut C,
    plan: &SessionPlan,
    states: &mut StateTracker,
) -> Result<SessionResult, RemoteError> {
    let mut shell = connection.open_interactive(plan.geometry).await?;
    let outcome = drive_shell(shell.as_mut(), plan, states).await;
    shell.close().await;
    outcome
}

async fn drive_shell(
    shell: &mut dyn InteractiveChannel,
    plan: &SessionPlan,
    states: &mut StateTracker,
) -> Result<SessionResult, RemoteError> {
    let mut framer = Framer::new(plan.poll_interval);

    states.advance(SessionState::BannerDrain);
    framer.drain(shell, plan.banner_settle).await;

    states.advance(SessionState::BootstrapRun);
    shell.send(&plan.bootstrap_line()).await?;

    states.advance(SessionState::BootstrapWait);
    let frame = framer
        .await_marker(shell, &plan.bootstrap_marker.token(), plan.bootstrap_timeout)
        .await;
    let environment = bootstrap_environment(plan, &frame);
    if !environment.ready {
        warn!(
            "Bootstrap marker not seen within {}s; continuing",
            plan.bootstrap_timeout.as_secs()
        );
    }

    states.advance(SessionState::CommandRun);
    shell.send(&plan.command_line()).await?;

    states.advance(SessionState::CommandWait);
    let frame = framer
        .await_marker(shell, &plan.command_marker.token(), plan.command_timeout)
        .await;

    Ok(command_result(plan, environment, frame))
}

fn bootstrap_environment(plan: &SessionPlan, frame: &Frame) -> SessionEnvironment {
    let cleaned = strip_control_sequences(&frame.text);
    let marker_prefix = plan.bootstrap_marker.prefix();
    let output = cleaned
        .lines()
        .filter(|line| !line.contains("stty -echo") && !line.contains(marker_prefix))
        .collect::<Vec<_>>()
        .join("\n");

    SessionEnvironment {
        label: plan.label.clone(),
        activation: plan.activation.clone(),
        output: output.trim().to_string(),
        ready: frame.saw_marker,
        bootstrap_timeout: plan.bootstrap_timeout,
    }
}

fn command_result(plan: &SessionPlan, environment: SessionEnvironment, frame: Frame) -> SessionResult {
    let mut cleaned = strip_control_sequences(&frame.text);
    if !environment.ready {
        // A late bootstrap may still print its marker during the command
        let marker_prefix = plan.bootstrap_marker.prefix();
        cleaned = cleaned
            .lines()
            .filter(|line| !line.contains(marker_prefix))
            .collect::<Vec<_>>()
            .join("\n");
    }
    let (output, exit_code) = parse_exit_code(&cleaned);
    debug!(
        "Command frame: {} bytes, marker seen: {}, exit code: {:?}",
        frame.text.len(),
        frame.saw_marker,
        exit_code
    );

    SessionResult {
        environment,
        command_output: output.trim().to_string(),
        exit_code,
        timed_out: !frame.saw_marker && !frame.stream_closed,
        stream_closed: frame.stream_closed,
        command_timeout: plan.command_timeout,
    }
}

/// Remove every `EXIT_CODE:` line from `text` and return the value of the
/// last one that carries a valid integer.
pub fn parse_exit_code(text: &str) -> (String, Option<i32>) {
    let mut exit_code = None;
    let mut kept = Vec::new();

    for line in text.lines() {
        match line.trim().strip_prefix(EXIT_CODE_TOKEN) {
            Some(value) => {
                if let Ok(code) = value.trim().parse::<i32>() {
                    exit_code = Some(code);
                }
            }
            None => kept.push(line),
        }
    }

    (kept.join("\n"), exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::{CommandOutput, Credentials, FileTransfer};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    /// What the fake shell prints in reply to each input line, in order.
    #[derive(Clone)]
    struct Script {
        banner: Vec<String>,
        replies: Vec<Vec<String>>,
    }

    struct FakeShell {
        replies: VecDeque<Vec<String>>,
        tx: Option<mpsc::UnboundedSender<String>>,
        rx: mpsc::UnboundedReceiver<String>,
        sent: Arc<std::sync::Mutex<Vec<String>>>,
        hang_up: bool,
    }

    #[async_trait]
    impl InteractiveChannel for FakeShell {
        async fn send(&mut self, input: &str) -> Result<(), RemoteError> {
            self.sent.lock().unwrap().push(input.to_string());
            if let (Some(chunks), Some(tx)) = (self.replies.pop_front(), &self.tx) {
                for chunk in chunks {
                    let _ = tx.send(chunk);
                }
            }
            if self.hang_up && self.replies.is_empty() {
                // Remote shell exits once the script runs out
                self.tx = None;
            }
            Ok(())
        }

        async fn next_chunk(&mut self) -> Option<String> {
            // While tx is held by self this only waits
            self.rx.recv().await
        }

        async fn close(&mut self) {}
    }

    struct FakeConnection {
        script: Script,
        closed: Arc<AtomicBool>,
        sent: Arc<std::sync::Mutex<Vec<String>>>,
        fail_open: bool,
        hang_up: bool,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn exec(
            &mut self,
            _command: &str,
            _timeout: Duration,
        ) -> Result<CommandOutput, RemoteError> {
            Ok(CommandOutput::default())
        }

        async fn open_interactive(
            &mut self,
            _geometry: TerminalGeometry,
        ) -> Result<Box<dyn InteractiveChannel>, RemoteError> {
            if self.fail_open {
                return Err(RemoteError::Channel("pty refused".to_string()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            for chunk in &self.script.banner {
                let _ = tx.send(chunk.clone());
            }
            Ok(Box::new(FakeShell {
                replies: self.script.replies.clone().into(),
                tx: Some(tx),
                rx,
                sent: self.sent.clone(),
                hang_up: self.hang_up,
            }))
        }

        async fn open_file_transfer(&mut self) -> Result<Box<dyn FileTransfer>, RemoteError> {
            Err(RemoteError::Transfer("not supported".to_string()))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeTransport {
        script: Script,
        closed: Arc<AtomicBool>,
        sent: Arc<std::sync::Mutex<Vec<String>>>,
        fail_open: bool,
        refuse: bool,
        hang_up: bool,
    }

    impl FakeTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                closed: Arc::new(AtomicBool::new(false)),
                sent: Arc::new(std::sync::Mutex::new(Vec::new())),
                fail_open: false,
                refuse: false,
                hang_up: false,
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        type Connection = FakeConnection;

        async fn connect(
            &self,
            _target: &RemoteTarget,
            _timeout: Duration,
        ) -> Result<FakeConnection, RemoteError> {
            if self.refuse {
                return Err(RemoteError::Connect("Connection refused".to_string()));
            }
            Ok(FakeConnection {
                script: self.script.clone(),
                closed: self.closed.clone(),
                sent: self.sent.clone(),
                fail_open: self.fail_open,
                hang_up: self.hang_up,
            })
        }
    }

    fn target() -> RemoteTarget {
        RemoteTarget {
            host: "login.example.edu".to_string(),
            port: 22,
            user: "alice".to_string(),
            credentials: Credentials::default(),
        }
    }

    fn quick_plan(command: &str) -> SessionPlan {
        let mut plan = SessionPlan::new(command);
        plan.activation = Some("module load synopsys".to_string());
        plan.label = Some("synopsys".to_string());
        plan.banner_settle = Duration::from_millis(50);
        plan.bootstrap_timeout = Duration::from_secs(1);
        plan.command_timeout = Duration::from_secs(2);
        plan.poll_interval = Duration::from_millis(10);
        plan.bootstrap_marker = Marker::from_parts("__RPTY_BOOT_", "1_test__");
        plan.command_marker = Marker::from_parts("__RPTY_DONE_", "2_test__");
        plan
    }

    fn bootstrap_reply(plan: &SessionPlan) -> Vec<String> {
        vec![
            // Echo of the typed line, with a prompt and colour noise
            format!("\x1B[01;32muser@login\x1B[0m:~$ {}", plan.bootstrap_line().replace('\n', "\r\n")),
            "Loading synopsys/2024\r\n".to_string(),
            format!("{}\r\n", plan.bootstrap_marker.token()),
        ]
    }

    mod lines {
        use super::*;

        #[test]
        fn test_bootstrap_line_with_activation() {
            let plan = quick_plan("echo hello");
            assert_eq!(
                plan.bootstrap_line(),
                "stty -echo 2>/dev/null; PS1=''; PS2=''; module load synopsys 2>&1; \
                 printf '%s%s\\n' '__RPTY_BOOT_' '1_test__'\n"
            );
        }

        #[test]
        fn test_bootstrap_line_without_activation() {
            let mut plan = quick_plan("true");
            plan.activation = None;
            let line = plan.bootstrap_line();
            assert!(line.starts_with("stty -echo"));
            assert!(!line.contains("2>&1"));
            assert!(line.ends_with("'1_test__'\n"));
        }

        #[test]
        fn test_command_line_reads_status_first() {
            let plan = quick_plan("make synth");
            assert_eq!(
                plan.command_line(),
                "make synth 2>&1; printf '\\nEXIT_CODE:%s\\n' \"$?\"; \
                 printf '%s%s\\n' '__RPTY_DONE_' '2_test__'\n"
            );
        }

        #[test]
        fn test_command_trailing_separator_trimmed() {
            let plan = quick_plan("cd src; make ;  ");
            assert!(plan.command_line().starts_with("cd src; make 2>&1;"));
        }

        #[test]
        fn test_lines_never_contain_marker_tokens() {
            let plan = quick_plan("echo hi");
            assert!(!plan.bootstrap_line().contains(&plan.bootstrap_marker.token()));
            assert!(!plan.command_line().contains(&plan.command_marker.token()));
        }
    }

    mod exit_codes {
        use super::*;

        #[test]
        fn test_zero_one_and_multi_digit() {
            assert_eq!(parse_exit_code("EXIT_CODE:0").1, Some(0));
            assert_eq!(parse_exit_code("out\nEXIT_CODE:1\n").1, Some(1));
            assert_eq!(parse_exit_code("EXIT_CODE:127").1, Some(127));
        }

        #[test]
        fn test_missing_token_is_absent() {
            let (text, code) = parse_exit_code("killed\n");
            assert_eq!(code, None);
            assert_eq!(text, "killed");
        }

        #[test]
        fn test_malformed_token_is_absent_and_removed() {
            let (text, code) = parse_exit_code("a\nEXIT_CODE:%s\nb");
            assert_eq!(code, None);
            assert_eq!(text, "a\nb");
        }

        #[test]
        fn test_last_valid_token_wins() {
            let (text, code) = parse_exit_code("EXIT_CODE:3\nmid\nEXIT_CODE:42\n");
            assert_eq!(code, Some(42));
            assert_eq!(text, "mid");
        }
    }

    mod sessions {
        use super::*;

        #[tokio::test]
        async fn test_echo_hello_succeeds() {
            let plan = quick_plan("echo hello");
            let script = Script {
                banner: vec!["Welcome to login.example.edu\r\n".to_string()],
                replies: vec![
                    bootstrap_reply(&plan),
                    vec![
                        "hello\r\n".to_string(),
                        "\r\nEXIT_CODE:0\r\n".to_string(),
                        format!("{}\r\n", plan.command_marker.token()),
                    ],
                ],
            };
            let transport = FakeTransport::new(script);

            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert_eq!(result.exit_code, Some(0));
            assert_eq!(result.command_output, "hello");
            assert!(!result.timed_out);
            assert!(!result.bootstrap_timed_out());
            assert_eq!(result.bootstrap_output(), "Loading synopsys/2024");
            assert_eq!(result.environment.label.as_deref(), Some("synopsys"));
            assert!(transport.closed.load(Ordering::SeqCst));
        }

        #[tokio::test]
        async fn test_exit_code_split_across_chunks() {
            let plan = quick_plan("false");
            let token = plan.command_marker.token();
            let (head, tail) = token.split_at(7);
            let script = Script {
                banner: vec![],
                replies: vec![
                    bootstrap_reply(&plan),
                    vec![
                        "\r\nEXIT_".to_string(),
                        "CODE:1\r\n".to_string(),
                        head.to_string(),
                        tail.to_string(),
                    ],
                ],
            };
            let transport = FakeTransport::new(script);

            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert_eq!(result.exit_code, Some(1));
            assert_eq!(result.command_output, "");
        }

        #[tokio::test]
        async fn test_never_terminating_command_times_out() {
            let plan = quick_plan("cat");
            let script = Script {
                banner: vec![],
                replies: vec![bootstrap_reply(&plan), vec!["waiting for input\r\n".to_string()]],
            };
            let transport = FakeTransport::new(script);

            let started = std::time::Instant::now();
            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert!(started.elapsed() >= Duration::from_secs(2));
            assert!(result.timed_out);
            assert_eq!(result.exit_code, None);
            assert_eq!(result.command_output, "waiting for input");
            assert!(transport.closed.load(Ordering::SeqCst));
        }

        #[tokio::test]
        async fn test_slow_bootstrap_still_runs_command() {
            let plan = quick_plan("echo hello");
            let script = Script {
                banner: vec![],
                replies: vec![
                    // Marker never printed
                    vec!["module: still loading\r\n".to_string()],
                    vec![
                        "hello\r\nEXIT_CODE:0\r\n".to_string(),
                        format!("{}\r\n", plan.command_marker.token()),
                    ],
                ],
            };
            let transport = FakeTransport::new(script);

            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert!(result.bootstrap_timed_out());
            assert_eq!(result.bootstrap_output(), "module: still loading");
            assert_eq!(result.exit_code, Some(0));
            assert!(!result.timed_out);
            assert_eq!(transport.sent.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_banner_never_reaches_output() {
            let plan = quick_plan("echo hello");
            let script = Script {
                banner: vec!["EXIT_CODE:99\r\nLast login: yesterday\r\n".to_string()],
                replies: vec![
                    bootstrap_reply(&plan),
                    vec![format!("hello\r\nEXIT_CODE:0\r\n{}\r\n", plan.command_marker.token())],
                ],
            };
            let transport = FakeTransport::new(script);

            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert_eq!(result.exit_code, Some(0));
            assert!(!result.command_output.contains("Last login"));
            assert!(!result.bootstrap_output().contains("Last login"));
        }

        #[tokio::test]
        async fn test_late_bootstrap_marker_kept_out_of_command_output() {
            let plan = quick_plan("echo hello");
            let script = Script {
                banner: vec![],
                replies: vec![
                    vec!["module: still loading\r\n".to_string()],
                    vec![
                        "Loaded synopsys/2024\r\n".to_string(),
                        format!("{}\r\n", plan.bootstrap_marker.token()),
                        "hello\r\nEXIT_CODE:0\r\n".to_string(),
                        format!("{}\r\n", plan.command_marker.token()),
                    ],
                ],
            };
            let transport = FakeTransport::new(script);

            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert!(result.bootstrap_timed_out());
            assert_eq!(result.exit_code, Some(0));
            assert!(!result.command_output.contains(plan.bootstrap_marker.prefix()));
            assert_eq!(result.command_output, "Loaded synopsys/2024\nhello");
        }

        #[tokio::test]
        async fn test_shell_exit_mid_command_reports_closed_stream() {
            let plan = quick_plan("make synth");
            let script = Script {
                banner: vec![],
                replies: vec![
                    bootstrap_reply(&plan),
                    vec!["Compiling top.v\r\n".to_string(), "Segmentation".to_string()],
                ],
            };
            let mut transport = FakeTransport::new(script);
            transport.hang_up = true;

            let started = std::time::Instant::now();
            let result = run_remote_command(&transport, &target(), &plan).await.unwrap();

            assert!(started.elapsed() < plan.command_timeout);
            assert!(result.stream_closed);
            assert!(!result.timed_out);
            assert_eq!(result.exit_code, None);
            assert_eq!(result.command_output, "Compiling top.v\nSegmentation");
            assert!(transport.closed.load(Ordering::SeqCst));
        }

        #[tokio::test]
        async fn test_connect_failure_is_error() {
            let mut transport = FakeTransport::new(Script {
                banner: vec![],
                replies: vec![],
            });
            transport.refuse = true;

            let err = run_remote_command(&transport, &target(), &quick_plan("ls"))
                .await
                .unwrap_err();

            assert!(matches!(err, RemoteError::Connect(_)));
        }

        #[tokio::test]
        async fn test_open_failure_still_closes_connection() {
            let mut transport = FakeTransport::new(Script {
                banner: vec![],
                replies: vec![],
            });
            transport.fail_open = true;

            let err = run_remote_command(&transport, &target(), &quick_plan("ls"))
                .await
                .unwrap_err();

            assert!(matches!(err, RemoteError::Channel(_)));
            assert!(transport.closed.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::BannerDrain.to_string(), "BannerDrain");
        assert_eq!(
            SessionState::Done(Completion::Timeout).to_string(),
            "Done(timeout)"
        );
    }
}
