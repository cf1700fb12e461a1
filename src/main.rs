use std::{
    env::args,
    fs::File,
    io::{self, stdout, BufWriter, Write},
    process::ExitCode,
};

use anyhow::{Context, Result};
use cmm::{scan, set_log_verbosity};
use getopts::Options;

fn usage(prog: &str, opts: &Options) {
    let req = format!("{prog} path");
    let brief = opts.short_usage(&req);
    print!("{}", opts.usage(&brief));
}

fn main() -> Result<ExitCode> {
    // cmm [path] - scan file, one token per line
    // optional -o FILE - write tokens to FILE instead of stdout
    // optional -v LEVEL - verbose

    let args: Vec<String> = args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "cmm".to_string());

    let mut opts = Options::new();
    opts.optopt("v", "verbose", "enable verbose output", "LEVEL");
    opts.optopt("o", "output", "write tokens to FILE", "FILE");
    opts.optflag("h", "help", "print this help menu");

    let matches = match opts.parse(args.iter().skip(1)) {
        Ok(m) => m,
        Err(f) => {
            usage(&prog, &opts);
            anyhow::bail!(f)
        }
    };

    if matches.opt_present("h") {
        usage(&prog, &opts);
        return Ok(ExitCode::SUCCESS);
    }

    let verbose = matches.opt_get_default("v", 0).unwrap_or(0);

    let _guard = set_log_verbosity(verbose)?;

    let [path] = matches.free.as_slice() else {
        anyhow::bail!("Usage: {prog} path [-o FILE] [-v LEVEL]")
    };

    let (tokens, diagnostics) = scan(path)?;

    let mut out: Box<dyn Write> = match matches.opt_str("o") {
        Some(file) => Box::new(BufWriter::new(
            File::create(&file).with_context(|| format!("While creating {file}"))?,
        )),
        None => Box::new(stdout().lock()),
    };
    for token in &tokens {
        writeln!(out, "{token}")?;
    }
    out.flush()?;

    let mut err = io::stderr().lock();
    for diagnostic in diagnostics.iter() {
        writeln!(err, "{diagnostic}")?;
    }

    Ok(if diagnostics.has_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
