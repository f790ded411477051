use clap::Parser;
use tweakctl::cli::{ChangeArg, Cli, Commands};

#[test]
fn test_commit_parses_pairs() {
    let cli = Cli::try_parse_from(["tweakctl", "commit", "telemetry=1", "hibernation=2"]).unwrap();
    match cli.command {
        Commands::Commit { changes } => assert_eq!(
            changes,
            vec![
                ChangeArg {
                    tweak_id: "telemetry".into(),
                    option_index: 1
                },
                ChangeArg {
                    tweak_id: "hibernation".into(),
                    option_index: 2
                },
            ]
        ),
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_commit_rejects_malformed_pairs() {
    assert!(Cli::try_parse_from(["tweakctl", "commit", "telemetry"]).is_err());
    assert!(Cli::try_parse_from(["tweakctl", "commit", "telemetry=on"]).is_err());
    assert!(Cli::try_parse_from(["tweakctl", "commit", "=1"]).is_err());
    assert!(Cli::try_parse_from(["tweakctl", "commit"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "tweakctl",
        "list",
        "--category",
        "privacy",
        "--json",
        "--socket",
        "/tmp/t.sock",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.socket.as_deref(), Some("/tmp/t.sock"));
    assert!(matches!(cli.command, Commands::List { category: Some(c) } if c == "privacy"));
}

#[test]
fn test_apply_and_revert_all() {
    let cli = Cli::try_parse_from(["tweakctl", "apply", "hibernation", "2"]).unwrap();
    assert!(matches!(cli.command, Commands::Apply { ref id, option: 2 } if id == "hibernation"));

    let cli = Cli::try_parse_from(["tweakctl", "revert-all", "a", "b"]).unwrap();
    assert!(matches!(cli.command, Commands::RevertAll { ids } if ids == ["a", "b"]));

    assert!(Cli::try_parse_from(["tweakctl", "apply", "hibernation", "-1"]).is_err());
}

#[test]
fn test_change_arg_trims_whitespace() {
    let change: ChangeArg = " telemetry = 0 ".parse().unwrap();
    assert_eq!(change.tweak_id, "telemetry");
    assert_eq!(change.option_index, 0);
}
