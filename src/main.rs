//! Scene Sync CLI - Tool for inspecting exported scene archives.

use std::env;
use std::path::Path;

use serde_json::Value;

use scene_sync::export::SceneArchive;
use scene_sync::sync::referenced_keys;
use scene_sync::core::ArrayKey;
use scene_sync::init_tracing;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut filter = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => filter = "debug",
            "-vv" | "--trace" => filter = "trace",
            "-q" | "--quiet" => filter = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(filter);

    if filtered_args.is_empty() {
        print_usage(&args[0]);
        return;
    }

    let command = filtered_args[0];
    let file = filtered_args.get(1).copied();
    let run: fn(&str, &SceneArchive) = match command {
        "info" | "i" => cmd_info,
        "tree" | "t" => cmd_tree,
        "arrays" | "a" => cmd_arrays,
        "help" | "h" | "-h" | "--help" => {
            print_usage(&args[0]);
            return;
        }
        path if Path::new(path).exists() => {
            // Bare file path
            run_on(path, cmd_info);
            return;
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    match file {
        Some(path) => run_on(path, run),
        None => {
            eprintln!("Usage: {} {command} <scene.sync>", args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    println!("Scene Sync CLI - Inspect exported scene archives");
    println!();
    println!("Usage: {prog} [options] <command> <scene.sync>");
    println!();
    println!("Commands:");
    println!("  i, info    Show archive summary");
    println!("  t, tree    Show the node hierarchy");
    println!("  a, arrays  List stored arrays");
    println!("  h, help    Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Errors only");
}

fn run_on(path: &str, run: fn(&str, &SceneArchive)) {
    tracing::info!("Opening archive: {path}");
    match SceneArchive::open(path) {
        Ok(archive) => run(path, &archive),
        Err(e) => {
            eprintln!("Failed to open {path}: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct NodeCounts {
    total: usize,
    by_type: std::collections::BTreeMap<String, usize>,
}

fn count_nodes(node: &Value, counts: &mut NodeCounts) {
    counts.total += 1;
    let ty = node["type"].as_str().unwrap_or("?").to_string();
    *counts.by_type.entry(ty).or_default() += 1;
    for child in node["dependencies"].as_array().into_iter().flatten() {
        count_nodes(child, counts);
    }
}

fn cmd_info(path: &str, archive: &SceneArchive) {
    let mut counts = NodeCounts::default();
    count_nodes(&archive.index, &mut counts);
    let bytes: usize = archive.arrays.values().map(Vec::len).sum();

    println!("Archive: {path}");
    println!("Layers:  {}", archive.index["properties"]["numberOfLayers"]);
    println!();
    println!("Nodes ({}):", counts.total);
    for (ty, n) in &counts.by_type {
        println!("  {ty:<24} {n}");
    }
    println!();
    println!("Arrays: {} ({bytes} bytes)", archive.arrays.len());
    let missing = archive.missing_arrays();
    if !missing.is_empty() {
        println!("Missing: {}", missing.len());
    }
}

fn cmd_tree(path: &str, archive: &SceneArchive) {
    println!("Archive: {path}");
    println!();
    print_tree(&archive.index, 0);
}

fn print_tree(node: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let ty = node["type"].as_str().unwrap_or("?");
    let id = node["id"].as_str().unwrap_or("?");
    let arrays = referenced_keys(&node["properties"]).len();
    if arrays > 0 {
        println!("{indent}{ty} [{id}] ({arrays} arrays)");
    } else {
        println!("{indent}{ty} [{id}]");
    }
    for child in node["dependencies"].as_array().into_iter().flatten() {
        print_tree(child, depth + 1);
    }
}

fn cmd_arrays(path: &str, archive: &SceneArchive) {
    println!("Archive: {path}");
    println!();
    let mut refs = Vec::new();
    collect_refs(&archive.index, &mut refs);
    for (key, bytes) in &archive.arrays {
        let desc = refs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| format!("{} {} {}", v["name"], v["dataType"], v["shape"]))
            .unwrap_or_default();
        println!("  {key}  {:>10} bytes  {desc}", bytes.len());
    }
}

fn collect_refs<'a>(value: &'a Value, out: &mut Vec<(ArrayKey, &'a Value)>) {
    match value {
        Value::Object(map) => {
            if let Some(key) = map.get("hash").and_then(Value::as_str).and_then(ArrayKey::from_hex) {
                out.push((key, value));
            }
            map.values().for_each(|v| collect_refs(v, out));
        }
        Value::Array(list) => list.iter().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}
