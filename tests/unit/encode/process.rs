use super::*;

fn sh(script: &str) -> ToolInvocation {
    ToolInvocation::new("sh").args(["-c", script])
}

#[cfg(unix)]
#[test]
fn captures_stdout_and_diagnostics() {
    let out = SystemToolRunner::default()
        .run(&sh("echo out; echo err 1>&2"))
        .unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "out");
    assert_eq!(out.diagnostics.trim(), "err");
}

#[cfg(unix)]
#[test]
fn non_zero_exit_becomes_encoding_error() {
    let out = SystemToolRunner::default()
        .run(&sh("echo 'Invalid argument' 1>&2; exit 3"))
        .unwrap();
    assert_eq!(out.exit_code, Some(3));
    match out.into_result() {
        Err(SlidecastError::Encoding {
            exit_code,
            diagnostics,
        }) => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(diagnostics, "Invalid argument");
        }
        other => panic!("expected encoding error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn diagnostics_keep_only_the_tail() {
    let runner = SystemToolRunner {
        timeout: None,
        diagnostics_limit: 16,
    };
    let out = runner
        .run(&sh("i=0; while [ $i -lt 200 ]; do printf 'noise' 1>&2; i=$((i+1)); done; printf 'FINAL' 1>&2"))
        .unwrap();
    assert_eq!(out.diagnostics.len(), 16);
    assert!(out.diagnostics.ends_with("FINAL"));
}

#[cfg(unix)]
#[test]
fn timeout_kills_the_child() {
    let runner = SystemToolRunner {
        timeout: Some(Duration::from_millis(100)),
        diagnostics_limit: DEFAULT_DIAGNOSTICS_LIMIT,
    };
    let started = Instant::now();
    let err = runner.run(&sh("sleep 5")).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(err.is_retryable());
    assert!(matches!(err, SlidecastError::Timeout { ref tool, .. } if tool == "sh"));
}

#[test]
fn missing_program_fails_to_spawn() {
    let err = SystemToolRunner::default()
        .run(&ToolInvocation::new("/definitely/not/a/real/tool"))
        .unwrap_err();
    assert!(err.to_string().contains("failed to spawn"));
    assert!(!is_tool_available(Path::new("/definitely/not/a/real/tool")));
}

#[test]
fn invocation_renders_for_logs() {
    let inv = ToolInvocation::new("/usr/bin/ffmpeg").args(["-i", "a b.png"]).arg("-y");
    assert_eq!(inv.tool_name(), "ffmpeg");
    assert_eq!(inv.display_line(), "/usr/bin/ffmpeg -i a b.png -y");
}
