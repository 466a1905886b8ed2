use std::{
    path::{Path, PathBuf},
    process::{Command, ExitCode},
};

use anyhow::{Context, Result, anyhow, bail};
use env_logger::Env;
use zen3d::{config, pipeline::{DEFAULT_RESOLUTION, EngineArgs}};

const USAGE: &str = "usage: zen3d convert -i <input model> -o <output glb> [-r <resolution>]";

#[derive(Debug, Clone, PartialEq)]
struct ConvertCli {
    input: PathBuf,
    output: PathBuf,
    resolution: u32,
}

fn parse_cli(args: &[String]) -> Result<ConvertCli> {
    let Some((command, rest)) = args.split_first() else {
        bail!("missing command\n{USAGE}");
    };
    if command != "convert" {
        bail!("unknown command: {command}\n{USAGE}");
    }

    let mut input = None;
    let mut output = None;
    let mut resolution = DEFAULT_RESOLUTION;
    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "-i" | "--input" => {
                let Some(v) = rest.get(i + 1) else {
                    return Err(anyhow!("missing value for -i"));
                };
                input = Some(PathBuf::from(v));
                i += 2;
            }
            "-o" | "--output" => {
                let Some(v) = rest.get(i + 1) else {
                    return Err(anyhow!("missing value for -o"));
                };
                output = Some(PathBuf::from(v));
                i += 2;
            }
            "-r" | "--resolution" => {
                let Some(v) = rest.get(i + 1) else {
                    return Err(anyhow!("missing value for -r"));
                };
                resolution = v
                    .parse()
                    .map_err(|e| anyhow!("invalid resolution '{v}': {e}"))?;
                if resolution == 0 {
                    bail!("resolution must be positive");
                }
                i += 2;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: -i <input>, -o <output>, -r <resolution>)"
                ));
            }
        }
    }

    Ok(ConvertCli {
        input: input.ok_or_else(|| anyhow!("missing required -i <input model>"))?,
        output: output.ok_or_else(|| anyhow!("missing required -o <output glb>"))?,
        resolution,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to read current directory")?
        .join(path))
}

fn run_convert(cli: ConvertCli) -> Result<ExitCode> {
    let input = cli
        .input
        .canonicalize()
        .with_context(|| format!("input model not found: {}", cli.input.display()))?;
    let output = absolute(&cli.output)?;

    let config_dir = config::config_dir()?;
    let cfg = config::load_or_init(&config_dir)?;

    let is_blend = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("blend"));
    if !is_blend {
        bail!("unsupported input format: {}", input.display());
    }

    let engine = cfg.engine().with_context(|| {
        format!(
            "check {}",
            config_dir.join(config::CONFIG_FILE_NAME).display()
        )
    })?;
    let engine_args = EngineArgs {
        resolution: cli.resolution,
        output: output.clone(),
        packer: cfg.packer().to_path_buf(),
    };

    log::info!(
        "converting {} at {}px via {}",
        input.display(),
        cli.resolution,
        engine.display()
    );
    let status = Command::new(engine)
        .arg(&input)
        .args(engine_args.to_positional())
        .status()
        .with_context(|| format!("failed to launch engine {}", engine.display()))?;

    if !status.success() {
        let code = status.code().unwrap_or(1);
        log::error!("engine exited with code {code}");
        return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
    }

    println!("[zen3d] saved: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let result = parse_cli(&argv).and_then(run_convert);
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[zen3d] {e:#}");
            ExitCode::FAILURE
        }
    }
}
