//! End-to-end tests driving the `macropp` binary's argument parsing and
//! engine wiring over small programs written to temporary files.

use std::io::Write;

use tempfile::NamedTempFile;

fn write_input(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn run_to_string(args: &[&str], input: &str) -> String {
    let input_file = write_input(input);
    let output_file = NamedTempFile::new().unwrap();
    let mut argv = vec!["macropp".to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    argv.push("-o".to_string());
    argv.push(output_file.path().display().to_string());
    argv.push(input_file.path().display().to_string());
    macropp_cli::run_args(&argv).unwrap();
    std::fs::read_to_string(output_file.path()).unwrap()
}

#[test]
fn define_and_call_a_macro() {
    let out = run_to_string(&[], "#define GREETING hello world\nGREETING\n");
    assert_eq!(out, "\nhello world\n");
}

#[test]
fn ifdef_suppresses_the_untaken_branch() {
    let out = run_to_string(
        &[],
        "#ifdef MISSING\nshould not appear\n#else\nshould appear\n#endif\n",
    );
    assert!(!out.contains("should not appear"));
    assert!(out.contains("should appear"));
}

#[test]
fn nested_if_inside_false_branch_stays_suppressed() {
    let out = run_to_string(
        &[],
        "#ifdef MISSING\n#ifdef ALSO_MISSING\nnope\n#else\nstill nope\n#endif\n#endif\n",
    );
    assert!(!out.contains("nope"));
}

#[test]
fn cli_define_seeds_a_macro_before_processing() {
    let out = run_to_string(&["-D", "GREETING=hi there"], "GREETING\n");
    assert_eq!(out, "hi there\n");
}

#[test]
fn c_preset_recognizes_line_comments() {
    let out = run_to_string(&["-C"], "before // a comment\nafter\n");
    assert!(out.contains("before"));
    assert!(out.contains("after"));
    assert!(!out.contains("a comment"));
}

#[test]
fn eval_directive_computes_arithmetic() {
    let out = run_to_string(&[], "#eval 2 + 3 * 4\n");
    assert_eq!(out.trim(), "14");
}

#[test]
fn rejects_multiple_presets() {
    let argv = vec!["macropp".to_string(), "-C".to_string(), "-T".to_string()];
    let result = macropp_cli::run_args(&argv);
    assert!(result.is_err());
}
