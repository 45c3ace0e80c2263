//! Tests for probe, checksum and top-level errors.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_probe() {
    match parse(&["hlsdl", "probe", "https://m.example/index.m3u8"]) {
        CliCommand::Probe { url } => assert_eq!(url, "https://m.example/index.m3u8"),
        _ => panic!("expected Probe"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["hlsdl", "checksum", "/tmp/show.mp4"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/tmp/show.mp4"),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["hlsdl"]).is_err());
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["hlsdl", "add", "https://m.example/"]).is_err());
}
