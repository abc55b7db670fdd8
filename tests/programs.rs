use assert_cmd::Command;
use serial_test::serial;

fn run(bin: &str, args: &[&str]) -> Vec<String> {
    let assert = Command::cargo_bin(bin)
        .unwrap()
        .env("LAMELLAR_THREADS", "4")
        .env_remove("LAMELLAR_NUM_PES")
        .env_remove("LAMELLAR_CHUNK_SIZE")
        .args(args)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let mut lines: Vec<String> = stdout.lines().map(|l| l.to_owned()).collect();
    lines.sort();
    lines
}

fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}

macro_rules! create_test {
    ($name:ident, $bin:expr, [$($arg:expr),*], $expected:expr) => {
        #[test]
        #[serial]
        fn $name() {
            let lines = run($bin, &[$($arg),*]);
            assert_eq!(lines, sorted($expected));
        }
    };
}

create_test!(hello, "hello", [], vec!["Hello world!".to_owned()]);

create_test!(
    hello2_default_message,
    "hello2-module",
    [],
    vec!["Hello, world!".to_owned()]
);

create_test!(
    hello2_message_override,
    "hello2-module",
    ["--message=hiya!"],
    vec!["hiya!".to_owned()]
);

create_test!(
    hello3_five_messages,
    "hello3-datapar",
    ["--numMessages=5"],
    (1..=5)
        .map(|i| format!("Hello, world! (from iteration {i} of 5)"))
        .collect()
);

create_test!(
    hello3_default_count,
    "hello3-datapar",
    [],
    (1..=100)
        .map(|i| format!("Hello, world! (from iteration {i} of 100)"))
        .collect()
);

create_test!(
    hello3_zero_messages,
    "hello3-datapar",
    ["--numMessages", "0"],
    Vec::<String>::new()
);

create_test!(
    hello4_two_locales,
    "hello4-datapar-dist",
    ["--numMessages=10", "-nl", "2"],
    (1..=10)
        .map(|i| {
            let locale = if i <= 5 { 1 } else { 2 };
            format!("Hello, world! (from iteration {i} of 10 owned by locale {locale} of 2)")
        })
        .collect()
);

create_test!(
    hello4_locale_tags,
    "hello4-datapar-dist",
    ["--numMessages=4", "-nl", "2", "--localeTag=ordinal"],
    (1..=4)
        .map(|i| {
            let locale = if i <= 2 { 1 } else { 2 };
            format!(
                "Hello, world! (from iteration {i} of 4 owned by locale {locale} of 2) [locale {locale} of 2]"
            )
        })
        .collect()
);

create_test!(
    hello2_dash_h_as_message,
    "hello2-module",
    ["--message", "-h"],
    vec!["-h".to_owned()]
);

create_test!(
    hello5_three_tasks,
    "hello5-taskpar",
    ["--numTasks=3"],
    (1..=3)
        .map(|t| format!("Hello, world! (from task {t} of 3)"))
        .collect()
);

create_test!(
    hello6_tasks_per_locale,
    "hello6-taskpar-dist",
    ["--numLocales=3", "--tasksPerLocale=2", "--printLocaleName=false"],
    (1..=3)
        .flat_map(|l| {
            (1..=2).map(move |t| format!("Hello, world! (from task {t} of 2 on locale {l} of 3)"))
        })
        .collect()
);

create_test!(
    hello6_single_task,
    "hello6-taskpar-dist",
    ["-nl=2", "--printLocaleName", "off"],
    vec![
        "Hello, world! (from locale 1 of 2)".to_owned(),
        "Hello, world! (from locale 2 of 2)".to_owned()
    ]
);

#[test]
#[serial]
fn hello6_prints_locale_names() {
    let lines = run("hello6-taskpar-dist", &["-nl", "2"]);
    assert_eq!(lines.len(), 2);
    for (l, line) in lines.iter().enumerate() {
        let prefix = format!("Hello, world! (from locale {} of 2 named ", l + 1);
        assert!(line.starts_with(&prefix), "{line}");
        assert!(line.ends_with(&format!("-{l})")), "{line}");
    }
}

#[test]
#[serial]
fn malformed_option_fails() {
    Command::cargo_bin("hello3-datapar")
        .unwrap()
        .arg("--numMessages=many")
        .assert()
        .failure()
        .stdout("");
}

#[test]
#[serial]
fn negative_count_fails() {
    Command::cargo_bin("hello5-taskpar")
        .unwrap()
        .arg("--numTasks=-1")
        .assert()
        .failure()
        .stdout("");
}

#[test]
#[serial]
fn zero_locales_fails() {
    Command::cargo_bin("hello4-datapar-dist")
        .unwrap()
        .args(["-nl", "0"])
        .assert()
        .failure()
        .stdout("");
}

#[test]
#[serial]
fn unknown_locale_tag_fails() {
    Command::cargo_bin("hello4-datapar-dist")
        .unwrap()
        .args(["--numMessages=4", "--localeTag=rank"])
        .assert()
        .failure()
        .stdout("");
}

#[test]
#[serial]
fn oversized_counts_fail() {
    Command::cargo_bin("hello3-datapar")
        .unwrap()
        .arg("--numMessages=9223372036854775807")
        .assert()
        .failure()
        .stdout("");
}

#[test]
#[serial]
fn help_lists_options() {
    let assert = Command::cargo_bin("hello6-taskpar-dist")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("--printLocaleName"));
    assert!(stdout.contains("--tasksPerLocale"));
    assert!(stdout.contains("-nl, --numLocales"));
    assert!(stdout.contains("--localeTag"));
    assert!(!stdout.contains("Hello, world!"));
}

#[test]
#[serial]
fn unknown_options_are_ignored() {
    let lines = run("hello5-taskpar", &["--numTasks=2", "--verbose", "extra"]);
    assert_eq!(
        lines,
        vec![
            "Hello, world! (from task 1 of 2)",
            "Hello, world! (from task 2 of 2)"
        ]
    );
}
