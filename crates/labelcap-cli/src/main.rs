//! `labelcap` command line front end
//!
//! Drives the image repository against a filesystem blob store: upload
//! image files, list and delete images, discover labels, and run timed
//! capture sessions fed from a directory of frames.

mod frames;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use frames::{read_image, DirectoryFrames};
use labelcap_core::{CaptureEvent, CaptureSession, ImageRepository, LabelcapConfig};
use labelcap_keys::ImageKey;
use labelcap_store::FsBlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .long("dataset")
        .default_value("")
        .help("Dataset name (empty places labels directly under the public root)")
}

fn label_arg() -> Arg {
    Arg::new("label")
        .long("label")
        .required(true)
        .help("Label name")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("labelcap")
        .version(labelcap_core::VERSION)
        .about("Capture and organize labeled images in a blob store")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Blob store root directory (overrides the config file)"),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload image files into a label")
                .arg(dataset_arg())
                .arg(label_arg())
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image files to upload"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List images of a label")
                .arg(dataset_arg())
                .arg(label_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("labels")
                .about("List labels of a dataset")
                .arg(
                    Arg::new("dataset")
                        .long("dataset")
                        .required(true)
                        .help("Dataset name"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete images by key")
                .arg(
                    Arg::new("keys")
                        .required(true)
                        .num_args(1..)
                        .help("Full image keys, e.g. public/plants/rose/<id>.jpg"),
                ),
        )
        .subcommand(
            Command::new("capture")
                .about("Capture frames from a directory on a timer")
                .arg(dataset_arg())
                .arg(label_arg())
                .arg(
                    Arg::new("frames")
                        .long("frames")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of image files used as camera frames"),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .value_parser(value_parser!(u64))
                        .help("Stop after this many frames (default: run until Ctrl-C)"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_parser(value_parser!(u64))
                        .help("Delay between frames in milliseconds"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<LabelcapConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => LabelcapConfig::load(path)?,
        None => LabelcapConfig::default(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("store") {
        config.store_root = root.clone();
    }
    Ok(config)
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

fn print_lines<T: serde::Serialize + std::fmt::Display>(
    items: impl IntoIterator<Item = T>,
    json: bool,
) -> anyhow::Result<()> {
    let items: Vec<T> = items.into_iter().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{item}");
        }
    }
    Ok(())
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(&matches)?;
    labelcap_core::logging::init_tracing(&config.log_filter);

    let store = Arc::new(FsBlobStore::new(&config.store_root));
    let repository = ImageRepository::new(store);

    match matches.subcommand() {
        Some(("upload", args)) => {
            let dataset = string_arg(args, "dataset")?;
            let label = string_arg(args, "label")?;
            for path in args.get_many::<PathBuf>("files").into_iter().flatten() {
                let payload = read_image(path)?;
                let key = repository
                    .upload(&payload, dataset, label)
                    .await
                    .with_context(|| format!("uploading {}", path.display()))?;
                println!("{key}");
            }
        }
        Some(("list", args)) => {
            let images = repository
                .list_images(string_arg(args, "dataset")?, string_arg(args, "label")?)
                .await?;
            print_lines(images, args.get_flag("json"))?;
        }
        Some(("labels", args)) => {
            let labels = repository.list_labels(string_arg(args, "dataset")?).await?;
            print_lines(labels, args.get_flag("json"))?;
        }
        Some(("delete", args)) => {
            let keys: Vec<ImageKey> = args
                .get_many::<String>("keys")
                .into_iter()
                .flatten()
                .map(|k| ImageKey::new(k.as_str()))
                .collect();
            let results = repository
                .remove_many(&keys, config.max_concurrent_uploads)
                .await;

            let mut failed = 0usize;
            for (key, result) in keys.iter().zip(results) {
                match result {
                    Ok(()) => println!("deleted {key}"),
                    Err(e) => {
                        eprintln!("failed to delete {key}: {e}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} deletes failed", keys.len());
            }
        }
        Some(("capture", args)) => {
            let dir = args
                .get_one::<PathBuf>("frames")
                .context("missing --frames")?;
            if let Some(count) = args.get_one::<u64>("count") {
                config.max_frames = Some(*count);
            }
            if let Some(ms) = args.get_one::<u64>("interval-ms") {
                config.capture_interval_ms = *ms;
            }
            capture(
                repository,
                DirectoryFrames::load(dir)?,
                string_arg(args, "dataset")?,
                string_arg(args, "label")?,
                &config,
            )
            .await?;
        }
        _ => {}
    }
    Ok(())
}

async fn capture(
    repository: ImageRepository,
    frames: DirectoryFrames,
    dataset: &str,
    label: &str,
    config: &LabelcapConfig,
) -> anyhow::Result<()> {
    tracing::info!(dataset, label, frames = frames.len(), "frame directory loaded");
    let (session, mut events) =
        CaptureSession::start(repository, Arc::new(frames), dataset, label, config)?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CaptureEvent::Uploaded { key, .. } => println!("{key}"),
                CaptureEvent::Failed { error } => eprintln!("upload failed: {error}"),
            }
        }
    });

    let progress = if config.max_frames.is_some() {
        session.finish().await?
    } else {
        eprintln!("capturing every {:?}, Ctrl-C to stop", config.capture_interval());
        tokio::signal::ctrl_c().await?;
        session.stop().await?
    };

    // Sender side is gone once the session has drained.
    let _ = tokio::time::timeout(Duration::from_secs(5), printer).await;
    eprintln!("{}", progress.status_line());
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(cli().get_matches()).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn upload_takes_many_files() {
        let matches = cli()
            .try_get_matches_from(["labelcap", "upload", "--label", "rose", "a.jpg", "b.png"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "upload");
        assert_eq!(string_arg(args, "dataset").unwrap(), "");
        assert_eq!(args.get_many::<PathBuf>("files").unwrap().count(), 2);
    }

    #[test]
    fn capture_requires_label() {
        let result =
            cli().try_get_matches_from(["labelcap", "capture", "--dataset", "ds", "--frames", "."]);
        assert!(result.is_err());
    }

    #[test]
    fn store_flag_overrides_config() {
        let matches = cli()
            .try_get_matches_from(["labelcap", "labels", "--dataset", "ds", "--store", "/tmp/x"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.store_root, PathBuf::from("/tmp/x"));
    }

    #[tokio::test]
    async fn upload_then_list_through_fs_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let image = dir.path().join("frame.jpg");
        std::fs::write(&image, [0xff, 0xd8]).unwrap();
        let store = dir.path().join("store");

        let argv: Vec<OsString> = vec![
            "labelcap".into(),
            "upload".into(),
            "--store".into(),
            store.clone().into_os_string(),
            "--dataset".into(),
            "plants".into(),
            "--label".into(),
            "rose".into(),
            image.into_os_string(),
        ];
        let upload = cli().try_get_matches_from(argv).unwrap();
        run(upload).await.unwrap();

        let repository = ImageRepository::new(Arc::new(FsBlobStore::new(&store)));
        let images = repository.list_images("plants", "rose").await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(images.iter().all(|k| k.as_str().ends_with(".jpg")));
    }
}
