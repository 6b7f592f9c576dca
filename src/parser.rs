//! Command pipelines: annotation files or synthetic images in, resolved
//! objects out

use crate::{ResolveArgs, SynthArgs};
use anyhow::{bail, Context, Result};
use hierbox_core::{resolve_hierarchy, HierarchyReport, LabelPair, ObjectKey, ObjectStore, ResolveConfig};
use hierbox_data::{JsonExporter, OpenImagesLoader, SynthConfig, SynthExample, SynthGenerator};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// Parse a `child:parent` label pair
pub fn parse_pair(text: &str) -> std::result::Result<LabelPair, String> {
    let (child, parent) = text
        .split_once(':')
        .ok_or_else(|| format!("expected child:parent, got {text:?}"))?;
    let (child, parent) = (child.trim(), parent.trim());
    if child.is_empty() || parent.is_empty() {
        return Err(format!("empty label in {text:?}"));
    }
    if child == parent {
        return Err(format!("{child} cannot be its own parent"));
    }
    Ok(LabelPair::new(child, parent))
}

pub fn load_config(path: Option<&Path>) -> Result<ResolveConfig> {
    let Some(path) = path else {
        return Ok(ResolveConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse config file: {:?}", path))
}

pub fn run_resolve(args: &ResolveArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.parallel {
        config.parallel_images = true;
    }

    let mut loader = OpenImagesLoader::new().lenient(args.lenient);
    for image in &args.images {
        loader = loader.add_image(image.as_str());
    }

    let mut store = ObjectStore::new();
    loader.load_path(&args.input, &mut store)?;
    if store.is_empty() {
        warn!("no objects to resolve");
    }

    let report = resolve_hierarchy(&mut store, &args.pairs, &config)?;
    log_report(&report);

    let exporter = JsonExporter::new().with_overlap_info(!args.no_overlap_info);
    emit(&exporter, &store, args.output.as_deref())
}

/// Generated images together with the relations they were built to have
#[derive(Serialize)]
struct SynthDump<'a> {
    seed: Option<u64>,
    examples: &'a [SynthExample],
}

pub fn run_synth(args: &SynthArgs) -> Result<()> {
    if args.count == 0 {
        bail!("--count must be at least 1");
    }
    let config = if args.small {
        SynthConfig::small()
    } else {
        SynthConfig::default()
    };
    let mut generator = match args.seed {
        Some(seed) => SynthGenerator::with_seed(config, seed),
        None => SynthGenerator::new(config),
    };

    let examples: Vec<SynthExample> = (0..args.count)
        .map(|n| {
            let mut example = generator.generate();
            for object in &mut example.objects {
                object.record.image_id = n.to_string();
            }
            example
        })
        .collect();
    info!(
        images = examples.len(),
        objects = examples.iter().map(SynthExample::len).sum::<usize>(),
        "generated synthetic images"
    );

    if !args.resolve {
        let dump = SynthDump {
            seed: args.seed,
            examples: &examples,
        };
        let json = serde_json::to_string_pretty(&dump).context("Failed to serialize examples")?;
        return write_text(json, args.output.as_deref());
    }

    let mut store = ObjectStore::new();
    let mut pairs = BTreeSet::new();
    let mut keys = Vec::with_capacity(examples.len());
    for example in &examples {
        keys.push(example.load_into(&mut store)?);
        pairs.extend(example.pairs.iter().cloned());
    }
    let pairs: Vec<LabelPair> = pairs.into_iter().collect();

    let report = resolve_hierarchy(&mut store, &pairs, &ResolveConfig::default())?;
    log_report(&report);
    check_parents(&store, &examples, &keys);

    emit(&JsonExporter::new(), &store, args.output.as_deref())
}

/// Count assigned parents the generator also considered plausible
fn check_parents(store: &ObjectStore, examples: &[SynthExample], keys: &[BTreeMap<usize, ObjectKey>]) {
    let mut matched = 0;
    let mut unexpected = 0;

    for (example, keys) in examples.iter().zip(keys) {
        let by_key: BTreeMap<&ObjectKey, usize> = keys.iter().map(|(idx, key)| (key, *idx)).collect();
        for object in &example.objects {
            let Some(resolved) = keys.get(&object.expected.idx).and_then(|key| store.get(key)) else {
                continue;
            };
            let Some(parents) = &resolved.relations().parent else {
                continue;
            };
            for (label, index) in parents {
                let parent_key = ObjectKey {
                    image_id: resolved.image_id().to_string(),
                    label: label.clone(),
                    index: *index,
                };
                let expected = object.expected.parents.get(label);
                match by_key.get(&parent_key) {
                    Some(idx) if expected.is_some_and(|c| c.contains(idx)) => matched += 1,
                    _ => unexpected += 1,
                }
            }
        }
    }
    info!(matched, unexpected, "compared parents with generator intent");
}

fn log_report(report: &HierarchyReport) {
    info!(
        images = report.images,
        objects = report.objects,
        overlap_facts = report.overlap_facts,
        duplicates = report.duplicates,
        "resolved hierarchy"
    );
    for (pair, outcome) in &report.pairs {
        info!(
            pair = %pair,
            assigned = outcome.assigned,
            ambiguous = outcome.ambiguous,
            no_candidates = outcome.no_candidates,
            "label pair"
        );
    }
}

fn emit(exporter: &JsonExporter, store: &ObjectStore, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            exporter.write(store, path)?;
            info!("wrote {} objects to {:?}", store.len(), path);
            Ok(())
        }
        None => write_text(exporter.to_string(store)?, None),
    }
}

fn write_text(text: String, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("Failed to write output to: {:?}", path)),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
