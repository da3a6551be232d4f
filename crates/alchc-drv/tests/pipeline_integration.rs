//! End-to-end pipeline tests through the `alchc` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn alchc() -> Command {
    Command::cargo_bin("alchc").expect("alchc binary")
}

/// Write `source` into a temp dir and compile it with explicit paths.
fn compile_source(source: &str) -> (TempDir, assert_cmd::assert::Assert) {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input.src");
    fs::write(&input, source).expect("write source");

    let assert = alchc()
        .arg(&input)
        .arg(dir.path().join("out.asm"))
        .arg(dir.path().join("frontend.ast"))
        .arg(dir.path().join("midend.ast"))
        .assert();
    (dir, assert)
}

fn read_asm(dir: &Path) -> String {
    fs::read_to_string(dir.join("out.asm")).expect("out.asm written")
}

#[test]
fn builtin_program_compiles_without_input() {
    let dir = tempdir().unwrap();
    alchc().current_dir(dir.path()).assert().success();

    let asm = read_asm(dir.path());
    assert!(asm.contains(":main\n"));
    assert!(asm.contains("OUT\n"));
}

#[test]
fn expression_statement_program() {
    let (dir, assert) = compile_source("1+2;");
    assert.success();

    let asm = read_asm(dir.path());
    assert!(asm.contains("PUSH 1\nPUSH 2\nADD\nPOP\n"), "asm:\n{asm}");
}

#[test]
fn main_function_program() {
    let source = "func main(a, b) {\n    x = a + b;\n    if (x) { print(x); };\n    return x;\n};\n";
    let (dir, assert) = compile_source(source);
    assert.success();

    let asm = read_asm(dir.path());
    assert!(asm.contains("CALL :main\nHLT\n"));
    assert!(asm.contains(":main\n"));
    assert!(asm.contains("OUT\n"));
    assert!(asm.contains("POPR RAX\nPOPR RBX\nRET\n"));
}

#[test]
fn undefined_function_aborts_before_backend() {
    let (dir, assert) = compile_source("func f() {};\ncall g();");
    assert
        .failure()
        .stderr(predicate::str::contains("undefined_function"))
        .stderr(predicate::str::contains("'g'"));

    assert!(!dir.path().join("out.asm").exists());
}

#[test]
fn return_in_proc_is_rejected() {
    let (_dir, assert) = compile_source("proc p() { return 1; };");
    assert
        .failure()
        .stderr(predicate::str::contains("return_in_proc"));
}

#[test]
fn unterminated_comment_is_a_lexical_error() {
    let (_dir, assert) = compile_source("/* unterminated");
    assert
        .failure()
        .stderr(predicate::str::contains("unterminated_comment"))
        .stderr(predicate::str::contains(":1:1"));
}

#[test]
fn frontend_stage_file_roundtrips() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.src");
    let source = "func main(a, b) {\n    x = a + b;\n    if (x) { print(x); };\n    return x;\n};\n";
    fs::write(&input, source).unwrap();

    alchc()
        .arg(&input)
        .arg(dir.path().join("out.asm"))
        .arg(dir.path().join("frontend.ast"))
        .arg(dir.path().join("midend.ast"))
        .arg("--keep-temps")
        .assert()
        .success();

    let first = fs::read_to_string(dir.path().join("frontend.ast")).unwrap();
    let reparsed = alchc_ast::Tree::from_text(&first).expect("stage file parses");
    let second = reparsed.to_text();
    assert_eq!(first, second);
}

#[test]
fn stage_files_removed_by_default() {
    let (dir, assert) = compile_source("x = 1;");
    assert.success();

    assert!(!dir.path().join("frontend.ast").exists());
    assert!(!dir.path().join("midend.ast").exists());
    assert!(dir.path().join("out.asm").exists());
}

#[test]
fn keep_temps_preserves_stage_files() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.src");
    fs::write(&input, "x = 1;").unwrap();

    alchc()
        .arg(&input)
        .arg(dir.path().join("out.asm"))
        .arg(dir.path().join("frontend.ast"))
        .arg(dir.path().join("midend.ast"))
        .arg("--keep-temps")
        .assert()
        .success();

    let midend = fs::read_to_string(dir.path().join("midend.ast")).unwrap();
    assert!(alchc_ast::Tree::from_text(&midend).is_ok());
}

#[test]
fn empty_source_emits_prelude_and_halt() {
    let (dir, assert) = compile_source("");
    assert.success();
    assert_eq!(read_asm(dir.path()), "PUSH 0\nPOPR RBX\nHLT\n");
}

#[test]
fn midend_folds_constants_before_the_backend() {
    let (dir, assert) = compile_source("print(1 + 2 * 3);");
    assert.success();

    let asm = read_asm(dir.path());
    assert!(asm.contains("PUSH 7\nOUT\n"), "asm:\n{asm}");
    assert!(!asm.contains("MULT"));
}
