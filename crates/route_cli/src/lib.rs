use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use canalmap::map::{EntityRegistry, LoadedMap};
use canalmap::spatial::SpatialIndex;
use canalmap::{
    load_map_file, GeoPoint, PathfindingMode, RoutePlanner, RouteRequest, RouteResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Route {
        map: PathBuf,
        request: RouteRequest,
    },
    Request {
        map: PathBuf,
        request: PathBuf,
    },
    Check {
        map: PathBuf,
    },
}

/// Parses `lat,lng`, rejecting anything outside the coordinate ranges.
pub fn parse_lat_lng(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("invalid coordinate '{raw}' (expected lat,lng)"))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid latitude in '{raw}'"))?;
    let lng = lng
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid longitude in '{raw}'"))?;
    let point = GeoPoint::new(lat, lng);
    if !point.is_valid() {
        return Err(format!("coordinate '{raw}' is out of range"));
    }
    Ok(point)
}

pub fn parse_command(args: &[String]) -> Result<CommandKind, String> {
    let command = args
        .first()
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();

    let mut map = None;
    let mut from = None;
    let mut to = None;
    let mut mode = PathfindingMode::default();
    let mut request = None;
    let mut index = 1usize;
    while index < args.len() {
        let flag = args[index].as_str();
        let value = args
            .get(index + 1)
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag {
            "--map" => map = Some(PathBuf::from(value)),
            "--from" => from = Some(parse_lat_lng(value)?),
            "--to" => to = Some(parse_lat_lng(value)?),
            "--mode" => mode = value.parse::<PathfindingMode>()?,
            "--request" => request = Some(PathBuf::from(value)),
            other => return Err(format!("unknown argument '{other}'")),
        }
        index += 2;
    }
    let map = map.ok_or_else(|| format!("{command} requires --map <file>"))?;

    match command {
        "route" => {
            let from = from.ok_or_else(|| "route requires --from <lat,lng>".to_string())?;
            let to = to.ok_or_else(|| "route requires --to <lat,lng>".to_string())?;
            Ok(CommandKind::Route {
                map,
                request: RouteRequest::new(from, to, mode),
            })
        }
        "request" => {
            let request =
                request.ok_or_else(|| "request requires --request <file.json>".to_string())?;
            Ok(CommandKind::Request { map, request })
        }
        "check" => Ok(CommandKind::Check { map }),
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

pub fn build_planner(map: &LoadedMap, mode: PathfindingMode) -> RoutePlanner {
    let index = Arc::new(SpatialIndex::build(&map.data.parcels));
    let registry = EntityRegistry::new(map.data.entities.iter().cloned());
    RoutePlanner::new(index, &map.data.water_nodes, &registry, mode)
}

pub fn answer_request(map: &LoadedMap, request: &RouteRequest) -> RouteResponse {
    let planner = build_planner(map, request.pathfinding_mode);
    RouteResponse::from_result(&planner.plan(request.start_point, request.end_point))
}

/// Human-readable summary of a map file and both graph variants.
pub fn check_report(map: &LoadedMap) -> String {
    let index = SpatialIndex::build(&map.data.parcels);
    let mut lines = vec![
        format!("parcels: {}", index.parcel_count()),
        format!("slots: {}", index.slots().len()),
        format!("entities: {}", map.data.entities.len()),
        format!("water nodes: {}", map.data.water_nodes.len()),
    ];
    for mode in [PathfindingMode::Real, PathfindingMode::All] {
        let planner = build_planner(map, mode);
        lines.push(format!(
            "graph {}: {} nodes, {} edges",
            mode,
            planner.graph().node_count(),
            planner.graph().edge_count()
        ));
    }
    let skipped = map.skipped.iter().chain(index.skipped()).collect::<Vec<_>>();
    lines.push(format!("skipped: {}", skipped.len()));
    lines.extend(skipped.iter().map(|record| format!("  {record}")));
    lines.join("\n")
}

pub fn run<W: Write>(kind: CommandKind, stdout: &mut W) -> Result<(), String> {
    match kind {
        CommandKind::Route { map, request } => {
            let map = load_map(&map)?;
            write_response(stdout, &answer_request(&map, &request))
        }
        CommandKind::Request { map, request } => {
            let map = load_map(&map)?;
            let text = fs::read_to_string(&request).map_err(|error| {
                format!("failed to read request file '{}': {error}", request.display())
            })?;
            let request: RouteRequest = serde_json::from_str(&text).map_err(|error| {
                format!("invalid route request '{}': {error}", request.display())
            })?;
            write_response(stdout, &answer_request(&map, &request))
        }
        CommandKind::Check { map } => {
            let map = load_map(&map)?;
            writeln!(stdout, "{}", check_report(&map))
                .map_err(|error| format!("failed to write output: {error}"))
        }
    }
}

fn load_map(path: &Path) -> Result<LoadedMap, String> {
    load_map_file(path).map_err(|error| error.to_string())
}

fn write_response<W: Write>(stdout: &mut W, response: &RouteResponse) -> Result<(), String> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|error| format!("failed to encode response: {error}"))?;
    writeln!(stdout, "{json}").map_err(|error| format!("failed to write output: {error}"))
}
