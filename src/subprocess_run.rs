// SPDX-License-Identifier: Apache-2.0

//! Runs external tools, capturing and optionally echoing their output, and
//! decides whether they failed.
//!
//! Simulators do not agree on how to report failure: some exit non-zero,
//! some only print a message. A command is therefore considered failed if
//! its exit code is non-zero (when checked) or if any of a per-command list
//! of error substrings appears in its stdout or stderr.
//!
//! Only stdout is displayed as it arrives; stderr is drained on a helper
//! thread so neither pipe can fill up, and is displayed in full once stdout
//! closes. This keeps the two streams from interleaving on the console.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use colored::Colorize;

use crate::benchwright_error::SubprocessError;
use crate::config::DisplayMode;
use crate::BenchwrightError;

/// Everything needed to run one external command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Overlaid on the inherited environment.
    pub env: BTreeMap<String, String>,
    pub disp_type: DisplayMode,
    /// Substrings that mark the command as failed wherever they appear.
    pub err_strs: Vec<String>,
    pub chk_ret_code: bool,
    /// Join the quoted arguments and run them through `sh -c`; needed when
    /// the program is itself a script.
    pub shell: bool,
}

impl CommandSpec {
    pub fn new<S: AsRef<str>>(args: &[S]) -> Self {
        CommandSpec {
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            cwd: None,
            env: BTreeMap::new(),
            disp_type: DisplayMode::OnError,
            err_strs: vec![],
            chk_ret_code: true,
            shell: false,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env = env.clone();
        self
    }

    pub fn disp_type(mut self, disp_type: DisplayMode) -> Self {
        self.disp_type = disp_type;
        self
    }

    pub fn err_strs<S: AsRef<str>>(mut self, err_strs: &[S]) -> Self {
        self.err_strs = err_strs.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn chk_ret_code(mut self, chk_ret_code: bool) -> Self {
        self.chk_ret_code = chk_ret_code;
        self
    }

    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// The command line in a form that can be pasted into a shell.
    pub fn command_string(&self) -> String {
        self.args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command that was judged successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProcess {
    pub args: Vec<String>,
    /// `-1` when the process was terminated by a signal.
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Quotes `arg` for a POSIX shell, leaving it bare when that is safe.
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if arg.chars().all(is_safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

struct PrintDisplay<W: Write> {
    mode: DisplayMode,
    lines: Vec<String>,
    out: W,
}

impl<W: Write> PrintDisplay<W> {
    fn new(mode: DisplayMode, out: W) -> Self {
        PrintDisplay {
            mode,
            lines: vec![],
            out,
        }
    }

    /// Writes `line` regardless of the display mode.
    fn announce(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.out, "{}", line)
    }

    fn print(&mut self, line: &str) -> std::io::Result<()> {
        let line = line.trim_end();
        match self.mode {
            DisplayMode::Realtime => writeln!(self.out, "{}", line),
            DisplayMode::OnError => {
                self.lines.push(line.to_string());
                Ok(())
            }
        }
    }

    /// Flushes anything held back in `OnError` mode.
    fn error_printing(&mut self) -> std::io::Result<()> {
        if self.mode == DisplayMode::OnError {
            for line in self.lines.drain(..) {
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Consumes `reader` line by line, displaying each line between
    /// `<name>`/`</name>` markers, and returns the full text.
    fn process_output<R: BufRead>(&mut self, mut reader: R, name: &str) -> std::io::Result<String> {
        let mut retval = String::new();
        let mut any_line = false;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            retval.push_str(&line);
            if !any_line {
                any_line = true;
                self.print(&format!("<{}>", name).magenta().bold().to_string())?;
            }
            self.print(&line)?;
        }
        if any_line {
            self.print(&format!("</{}>", name).magenta().bold().to_string())?;
        }
        Ok(retval)
    }
}

/// Reads both streams of a child: stdout on this thread, stderr drained on a
/// helper thread. The helper is always joined before returning. If reading
/// stdout fails, `abort` is called first so the helper's stream can close.
fn capture_output<W, O, E>(
    display: &mut PrintDisplay<W>,
    stdout: O,
    mut stderr: E,
    abort: impl FnOnce(),
) -> std::io::Result<(String, String)>
where
    W: Write,
    O: Read,
    E: Read + Send + 'static,
{
    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        stderr.read_to_end(&mut bytes)?;
        Ok(bytes)
    });

    let stdout = display.process_output(BufReader::new(stdout), "STDOUT");
    if stdout.is_err() {
        abort();
    }
    let stderr_bytes = stderr_thread.join().map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::Other, "stderr reader thread panicked")
    })?;
    let stdout = stdout?;
    let stderr_bytes = stderr_bytes?;
    let stderr = display.process_output(&stderr_bytes[..], "STDERR")?;
    Ok((stdout, stderr))
}

/// Runs `spec`, returning its captured output, or an error describing every
/// detected failure reason.
pub fn subprocess_run(spec: &CommandSpec) -> Result<CompletedProcess, BenchwrightError> {
    subprocess_run_to(spec, std::io::stdout())
}

/// Like [`subprocess_run`], but shows the command echo, the child's output
/// and the error list on `out` instead of the process's stdout.
pub fn subprocess_run_to<W: Write>(
    spec: &CommandSpec,
    out: W,
) -> Result<CompletedProcess, BenchwrightError> {
    if spec.args.is_empty() {
        return Err(BenchwrightError::Configuration(
            "cannot run an empty command".to_string(),
        ));
    }
    let mut display = PrintDisplay::new(spec.disp_type, out);

    let cmd_str = spec.command_string();
    display.announce(&format!("{}{}", "Running command: ".cyan().bold(), cmd_str))?;
    log::info!("subprocess_run; cwd: {:?}; command: {}", spec.cwd, cmd_str);

    let mut command = if spec.shell {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&cmd_str);
        command
    } else {
        let mut command = Command::new(&spec.args[0]);
        command.args(&spec.args[1..]);
        command
    };
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    command
        .envs(spec.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let captured = match (child.stdout.take(), child.stderr.take()) {
        (Some(child_stdout), Some(child_stderr)) => {
            capture_output(&mut display, child_stdout, child_stderr, || {
                let _ = child.kill();
            })
        }
        _ => {
            let _ = child.kill();
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "child output was not captured",
            ))
        }
    };
    // Reap the child even when its output could not be read.
    let status = child.wait();
    let (stdout, stderr) = captured?;
    let status = status?;
    let returncode = status.code().unwrap_or(-1);
    log::debug!("subprocess_run; exit status: {}", status);

    let mut err_msg = vec![];
    if spec.chk_ret_code && returncode != 0 {
        err_msg.push(format!("Got return code {}.", returncode));
    }
    for err_str in spec.err_strs.iter() {
        if stdout.contains(err_str.as_str()) {
            err_msg.push(format!("Found \"{}\" in STDOUT.", err_str));
        }
        if stderr.contains(err_str.as_str()) {
            err_msg.push(format!("Found \"{}\" in STDERR.", err_str));
        }
    }

    if !err_msg.is_empty() {
        display.error_printing()?;
        display.announce(
            &format!("Found {} error(s):", err_msg.len())
                .red()
                .bold()
                .to_string(),
        )?;
        for (k, e) in err_msg.iter().enumerate() {
            display.announce(&format!("{}) {}", k + 1, e).red().bold().to_string())?;
        }
        return Err(BenchwrightError::Subprocess(SubprocessError {
            command: cmd_str,
            exit_code: returncode,
            stdout,
            stderr,
            reasons: err_msg,
        }));
    }

    Ok(CompletedProcess {
        args: spec.args.clone(),
        returncode,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("iverilog"), "iverilog");
        assert_eq!(shell_quote("-otop_tb"), "-otop_tb");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
        assert_eq!(shell_quote("+define+X=1"), "+define+X=1");
    }

    #[test]
    fn test_command_string_is_quoted() {
        let spec = CommandSpec::new(&["set_property", "-value", "{A B}"]);
        assert_eq!(spec.command_string(), "set_property -value '{A B}'");
    }

    #[cfg(unix)]
    #[test]
    fn test_error_substring_in_stdout_raises() {
        let _ = env_logger::builder().is_test(true).try_init();
        let spec = CommandSpec::new(&["sh", "-c", "printf 'X '"]).err_strs(&["X"]);
        let err = subprocess_run(&spec).unwrap_err();
        let details = err.subprocess_error().expect("subprocess details");
        assert_eq!(details.exit_code, 0);
        assert_eq!(details.reasons, vec!["Found \"X\" in STDOUT.".to_string()]);
        assert_eq!(details.stdout, "X ");
    }

    #[cfg(unix)]
    #[test]
    fn test_no_error_substring_returns_output() {
        let spec = CommandSpec::new(&["sh", "-c", "printf 'X '"]);
        let got = subprocess_run(&spec).unwrap();
        assert_eq!(got.returncode, 0);
        assert!(got.stdout.contains('X'));
        assert_eq!(got.stderr, "");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_and_stderr_substring_are_both_reported() {
        let spec = CommandSpec::new(&["sh", "-c", "echo out; echo 'ERROR: bad' 1>&2; exit 3"])
            .err_strs(&["ERROR"]);
        let err = subprocess_run(&spec).unwrap_err();
        let details = err.subprocess_error().unwrap();
        assert_eq!(
            details.reasons,
            vec![
                "Got return code 3.".to_string(),
                "Found \"ERROR\" in STDERR.".to_string(),
            ]
        );
        assert_eq!(details.stdout, "out\n");
        assert_eq!(details.stderr, "ERROR: bad\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_unchecked_return_code_is_not_an_error() {
        let spec = CommandSpec::new(&["sh", "-c", "exit 2"]).chk_ret_code(false);
        let got = subprocess_run(&spec).unwrap();
        assert_eq!(got.returncode, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_mode_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("BENCHWRIGHT_GREETING".to_string(), "hello".to_string());
        let spec = CommandSpec::new(&["echo", "$BENCHWRIGHT_GREETING"])
            .env(&env)
            .cwd(dir.path())
            .shell(true)
            .disp_type(DisplayMode::Realtime);
        // The argument is quoted, so the shell does not expand it.
        let got = subprocess_run(&spec).unwrap();
        assert_eq!(got.stdout, "$BENCHWRIGHT_GREETING\n");

        let spec = CommandSpec::new(&["sh", "-c", "echo $BENCHWRIGHT_GREETING; pwd"])
            .env(&env)
            .cwd(dir.path());
        let got = subprocess_run(&spec).unwrap();
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            got.stdout,
            format!("hello\n{}\n", canonical.display())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_deadlock() {
        let script = "i=0; while [ $i -lt 20000 ]; do echo 'noise noise noise noise' 1>&2; i=$((i+1)); done; echo done";
        let spec = CommandSpec::new(&["sh", "-c", script]);
        let got = subprocess_run(&spec).unwrap();
        assert_eq!(got.stdout, "done\n");
        assert_eq!(got.stderr.lines().count(), 20000);
    }

    #[test]
    fn test_spawn_failure_is_io_error() {
        let spec = CommandSpec::new(&["benchwright-definitely-not-a-real-binary"]);
        assert!(matches!(
            subprocess_run(&spec),
            Err(BenchwrightError::Io(_))
        ));
    }

    #[test]
    fn test_on_error_display_holds_output_until_failure() {
        let mut display = PrintDisplay::new(DisplayMode::OnError, Vec::new());
        let stdout = display
            .process_output(&b"first\nsecond\n"[..], "STDOUT")
            .unwrap();
        assert_eq!(stdout, "first\nsecond\n");
        assert!(display.out.is_empty());

        display.error_printing().unwrap();
        let shown = String::from_utf8(display.out).unwrap();
        let open = shown.find("<STDOUT>").expect("opening marker");
        let first = shown.find("first").unwrap();
        let second = shown.find("second").unwrap();
        let close = shown.find("</STDOUT>").expect("closing marker");
        assert!(open < first && first < second && second < close, "{}", shown);
    }

    #[test]
    fn test_realtime_display_writes_immediately() {
        let mut display = PrintDisplay::new(DisplayMode::Realtime, Vec::new());
        display.process_output(&b"hello\n"[..], "STDERR").unwrap();
        let shown = String::from_utf8(display.out.clone()).unwrap();
        assert!(shown.contains("<STDERR>"));
        assert!(shown.contains("hello\n"));
        assert!(shown.contains("</STDERR>"));

        // Nothing is held back, so a later failure does not repeat it.
        display.error_printing().unwrap();
        assert_eq!(String::from_utf8(display.out).unwrap(), shown);
    }

    #[test]
    fn test_empty_stream_has_no_markers() {
        let mut display = PrintDisplay::new(DisplayMode::Realtime, Vec::new());
        assert_eq!(display.process_output(&b""[..], "STDOUT").unwrap(), "");
        assert!(display.out.is_empty());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "pipe broke"))
        }
    }

    /// Yields `data` and records when it has been read to the end.
    struct TrackedReader {
        data: std::io::Cursor<Vec<u8>>,
        drained: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl Read for TrackedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                self.drained.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            Ok(n)
        }
    }

    #[test]
    fn test_stdout_read_error_aborts_and_joins_stderr_reader() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let drained = Arc::new(AtomicBool::new(false));
        let stderr = TrackedReader {
            data: std::io::Cursor::new(b"late noise\n".to_vec()),
            drained: drained.clone(),
        };
        let mut aborted = false;
        let mut display = PrintDisplay::new(DisplayMode::OnError, Vec::new());
        let got = capture_output(&mut display, FailingReader, stderr, || aborted = true);

        let err = got.unwrap_err();
        assert_eq!(err.to_string(), "pipe broke");
        assert!(aborted);
        // The stderr thread was joined before the error came back.
        assert!(drained.load(Ordering::SeqCst));
    }

    #[test]
    fn test_capture_output_reads_both_streams() {
        let mut aborted = false;
        let mut display = PrintDisplay::new(DisplayMode::OnError, Vec::new());
        let (stdout, stderr) = capture_output(
            &mut display,
            &b"out\n"[..],
            std::io::Cursor::new(b"err\n".to_vec()),
            || aborted = true,
        )
        .unwrap();
        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
        assert!(!aborted);
        assert!(display.out.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_on_error_run_shows_output_only_on_failure() {
        let spec = CommandSpec::new(&["sh", "-c", "echo quiet-line"]).err_strs(&["ERROR"]);
        let mut out = Vec::new();
        subprocess_run_to(&spec, &mut out).unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Running command: "));
        assert!(!shown.contains("quiet-line"), "{}", shown);

        let spec = CommandSpec::new(&["sh", "-c", "echo loud-line; echo ERROR"])
            .err_strs(&["ERROR"]);
        let mut out = Vec::new();
        assert!(subprocess_run_to(&spec, &mut out).is_err());
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("<STDOUT>"), "{}", shown);
        assert!(shown.contains("loud-line"));
        assert!(shown.contains("</STDOUT>"));
        assert!(shown.contains("Found 1 error(s):"));
        assert!(shown.contains("1) Found \"ERROR\" in STDOUT."));
    }
}
