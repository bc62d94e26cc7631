// SPDX-License-Identifier: Apache-2.0

mod apply;
mod config;
mod diff;
mod error;
mod gen_conf;
mod parse;
mod state;

use env_logger::Builder;
use log::LevelFilter;

use crate::error::CliError;

const APP_NAME: &str = "devconfctl";

const SUB_CMD_GEN_CONF: &str = "gc";
const SUB_CMD_PARSE: &str = "parse";
const SUB_CMD_DIFF: &str = "diff";
const SUB_CMD_APPLY: &str = "apply";
const SUB_CMD_VERSION: &str = "version";

fn schema_arg() -> clap::Arg<'static> {
    clap::Arg::new("SCHEMA")
        .required(true)
        .index(1)
        .help("YAML file describing the feature model")
}

fn main() {
    let matches = clap::Command::new(APP_NAME)
        .version(clap::crate_version!())
        .about("Command line of devconf")
        .subcommand_required(true)
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Set verbose level")
                .global(true),
        )
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .help("Disable logging")
                .global(true),
        )
        .arg(
            clap::Arg::new("CONFIG")
                .long("config")
                .takes_value(true)
                .help("Configuration file")
                .global(true),
        )
        .arg(
            clap::Arg::new("CONTEXT")
                .long("context")
                .takes_value(true)
                .multiple_occurrences(true)
                .help("Discriminant value for variant fields, KEY=VALUE")
                .global(true),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_GEN_CONF)
                .about("Generate set statements for specified options tree")
                .arg(schema_arg())
                .arg(
                    clap::Arg::new("TREE")
                        .required(true)
                        .index(2)
                        .help("Options tree file in YAML or JSON, - for stdin"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_PARSE)
                .about("Parse captured 'display set' output into options tree")
                .arg(schema_arg())
                .arg(
                    clap::Arg::new("CONFIG_FILE")
                        .required(false)
                        .index(2)
                        .help("Captured configuration, stdin if not defined"),
                )
                .arg(
                    clap::Arg::new("IDENTITY")
                        .long("identity")
                        .takes_value(true)
                        .help("Identity of the parsed object"),
                )
                .arg(
                    clap::Arg::new("JSON")
                        .long("json")
                        .takes_value(false)
                        .help("Show options tree in json format"),
                )
                .arg(
                    clap::Arg::new("STRICT")
                        .long("strict")
                        .takes_value(false)
                        .help("Fail on statements not described by the model"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_DIFF)
                .about("Show statements changed by applying options tree")
                .arg(schema_arg())
                .arg(
                    clap::Arg::new("CURRENT_CONFIG")
                        .required(true)
                        .index(2)
                        .help(
                            "Captured configuration of the object, relative \
                            to its path",
                        ),
                )
                .arg(
                    clap::Arg::new("TREE")
                        .required(true)
                        .index(3)
                        .help("Desired options tree file"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_APPLY)
                .about("Apply options tree offline into a statement batch")
                .arg(schema_arg())
                .arg(
                    clap::Arg::new("TREE")
                        .required(true)
                        .index(2)
                        .help("Options tree file in YAML or JSON, - for stdin"),
                )
                .arg(
                    clap::Arg::new("OPERATION")
                        .long("operation")
                        .takes_value(true)
                        .possible_values(["create", "update", "delete"])
                        .default_value("create")
                        .help("Operation to perform"),
                )
                .arg(
                    clap::Arg::new("IDENTITY")
                        .long("identity")
                        .takes_value(true)
                        .help(
                            "Object to update or delete, default to the \
                            identity held by the tree",
                        ),
                )
                .arg(
                    clap::Arg::new("OUTPUT")
                        .short('o')
                        .long("output")
                        .takes_value(true)
                        .help("Write statement batch to file"),
                )
                .arg(
                    clap::Arg::new("TIMEOUT")
                        .long("timeout")
                        .takes_value(true)
                        .help("Timeout in seconds of the operation"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_VERSION).about("Show version"),
        )
        .get_matches();

    let (log_module_filters, log_level) =
        match matches.occurrences_of("verbose") {
            0 => (vec!["devconf", "devconfctl"], LevelFilter::Info),
            1 => (vec!["devconf", "devconfctl"], LevelFilter::Debug),
            _ => (vec![""], LevelFilter::Debug),
        };

    if !matches.is_present("quiet") {
        let mut log_builder = Builder::new();
        for log_module_filter in log_module_filters {
            if !log_module_filter.is_empty() {
                log_builder.filter(Some(log_module_filter), log_level);
            } else {
                log_builder.filter(None, log_level);
            }
        }
        log_builder.init();
    }

    if let Some(matches) = matches.subcommand_matches(SUB_CMD_GEN_CONF) {
        print_result_and_exit(gen_conf::gen_conf(matches));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_PARSE) {
        print_result_and_exit(parse::parse(matches));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_DIFF) {
        print_result_and_exit(diff::diff(matches));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_APPLY) {
        print_result_and_exit(apply::apply(matches));
    } else if matches.subcommand_matches(SUB_CMD_VERSION).is_some() {
        print_result_and_exit(Ok(format!(
            "{} {}",
            APP_NAME,
            clap::crate_version!()
        )));
    }
}

fn print_result_and_exit(result: Result<String, CliError>) {
    match result {
        Ok(s) => {
            if !s.is_empty() {
                println!("{s}");
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", e.error_msg);
            std::process::exit(e.code);
        }
    }
}
