use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{Read, Write};

use vignette::backend::target::{Dot, Ini};
use vignette::options::Options;
use vignette::runtime::Parameters;
use vignette::Context;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a script into node records
    Compile {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Output file, or pass "-" to write to stdout
        #[clap(short, long, value_parser, default_value = "-")]
        output: clio::Output,

        /// Output format
        #[clap(long, value_enum, default_value_t = Format::Ini)]
        format: Format,
    },

    /// Decompile node records back into a script
    Decompile {
        /// Record file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Output file, or pass "-" to write to stdout
        #[clap(short, long, value_parser, default_value = "-")]
        output: clio::Output,

        /// Spaces per indentation level
        #[clap(long, default_value_t = 4)]
        indent: usize,
    },

    /// Walk node records from the entry node
    Run {
        /// Record file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Random seed for offer text choices
        #[clap(long, default_value_t = 4869)]
        seed: u64,

        /// Faction offering the mission
        #[clap(long)]
        offer_group: Option<String>,

        /// Condition to treat as true, may be repeated
        #[clap(long = "set")]
        conditions: Vec<String>,

        /// Print every visited node
        #[clap(long)]
        trace: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Ini,
    Dot,
}

fn read(mut input: clio::Input) -> Result<String> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    Ok(text)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    match args.command {
        Command::Compile {
            file,
            mut output,
            format,
        } => {
            let filename = file.path().display().to_string();
            let source = read(file)?;
            let context = Context::new().add_file(&filename, &source)?;
            match format {
                Format::Ini => context.output_stream::<Ini>(&mut output)?,
                Format::Dot => context.output_stream::<Dot>(&mut output)?,
            }
        }
        Command::Decompile {
            file,
            mut output,
            indent,
        } => {
            let options = Options {
                indent,
                ..Default::default()
            };
            let script = Context::new()
                .set_options(options)
                .add_records(&read(file)?)?
                .decompile()?;
            output.write_all(script.as_bytes())?;
        }
        Command::Run {
            file,
            seed,
            offer_group,
            conditions,
            trace,
        } => {
            let options = Options {
                seed,
                trace,
                ..Default::default()
            };
            let mut params = Parameters::new();
            if let Some(group) = offer_group {
                params = params.offer_group(group);
            }
            for condition in &conditions {
                params = params.set(condition);
            }
            let info = Context::new()
                .set_options(options)
                .add_records(&read(file)?)?
                .run(&params)?;
            print!("{info}");
        }
    }

    Ok(())
}
