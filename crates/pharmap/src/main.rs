use std::sync::Arc;

use futures_lite::StreamExt;
use macro_rules_attribute::apply;
use smol_macros::main;

use pharmap_geo::{nominatim, Coordinate, Geocoder};
use pharmap_locator::viewport::DEFAULT_ZOOM;
use pharmap_locator::{stores, Coordinator, MapViewport, SearchController, SearchUpdate};

/// Country-level starting view.
const START_CENTER: (f64, f64) = (22.9734, 78.6569);

#[apply(main!)]
async fn main(executor: Arc<async_executor::Executor<'static>>) {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,isahc=error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let geocoder_url =
        std::env::var("PHARMAP_GEOCODER_URL").unwrap_or_else(|_| nominatim::DEFAULT_URL.to_owned());
    tracing::info!(url = %geocoder_url, "using geocoder");
    let geocoder: Arc<dyn Geocoder> = Arc::new(nominatim::Backend::with_base_url(geocoder_url));

    let viewport = MapViewport::new(
        Coordinate::new(START_CENTER.0, START_CENTER.1),
        DEFAULT_ZOOM,
    );
    let coordinator = Coordinator::new(Arc::clone(&executor), Arc::clone(&geocoder), viewport);

    // Existing pharmacies, rendered as static markers when configured.
    if let Ok(api_url) = std::env::var("PHARMAP_API_URL") {
        match stores::Directory::new(api_url).list().await {
            Ok(listing) => {
                tracing::info!(count = listing.len(), "loaded store directory");
                coordinator.set_store_markers(stores::markers(&listing));
            }
            Err(e) => tracing::warn!(error = %e, "store directory unavailable"),
        }
    }

    let (input_tx, input_rx) = async_channel::bounded::<String>(16);
    let (update_tx, update_rx) = async_channel::bounded::<SearchUpdate>(16);
    executor
        .spawn(SearchController::new(geocoder).run(
            Arc::clone(&executor),
            input_rx,
            coordinator.subscribe(),
            update_tx,
        ))
        .detach();

    // Search updates feed the coordinator and the printed list.
    {
        let coordinator = coordinator.clone();
        executor
            .spawn(async move {
                while let Ok(update) = update_rx.recv().await {
                    coordinator.apply_search(update.clone());
                    render_suggestions(&coordinator, &update);
                }
            })
            .detach();
    }

    // Selection updates from the coordinator.
    {
        let mut selections = coordinator.subscribe();
        executor
            .spawn(async move {
                while let Ok(selected) = selections.recv().await {
                    println!(
                        "selected [{}]: {} @ {}",
                        selected.origin, selected.address, selected.coordinate
                    );
                }
            })
            .detach();
    }

    run_console(&coordinator, &input_tx).await;
}

fn render_suggestions(coordinator: &Coordinator, update: &SearchUpdate) {
    match update {
        SearchUpdate::Cleared => {}
        SearchUpdate::Failed { query } => {
            println!("search for \"{query}\" failed, try again");
        }
        SearchUpdate::Candidates { query, .. } => {
            let candidates = coordinator.suggestions();
            if candidates.is_empty() {
                println!("no results for \"{query}\"");
                return;
            }
            println!("results for \"{query}\":");
            for (i, c) in candidates.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, c.display_name, c.coordinate);
            }
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  search <text>       search for a place (min 3 chars)");
    println!("  pick <n>            select a suggestion by number");
    println!("  click <lat> <lon>   simulate a map click");
    println!("  manual <lat> <lon>  enter coordinates directly");
    println!("  map                 show the current map state");
    println!("  quit");
}

async fn run_console(coordinator: &Coordinator, inputs: &async_channel::Sender<String>) {
    use futures_lite::io::AsyncBufReadExt;

    print_help();

    let stdin = blocking::Unblock::new(std::io::stdin());
    let reader = futures_lite::io::BufReader::new(stdin);
    let mut lines = reader.lines();

    while let Some(line) = lines.next().await {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "search" => {
                if inputs.send(rest.to_owned()).await.is_err() {
                    break;
                }
            }
            "pick" => match rest.trim().parse::<usize>() {
                Ok(n) if n > 0 => {
                    if coordinator.select_suggestion(n - 1).is_none() {
                        println!("no suggestion {n}");
                    }
                }
                _ => println!("usage: pick <n>"),
            },
            "click" => match parse_pair(rest) {
                Some((lat, lon)) => match Coordinate::try_new(lat, lon) {
                    Ok(coordinate) => {
                        coordinator.map_click(coordinate);
                    }
                    Err(e) => println!("{e}"),
                },
                None => println!("usage: click <lat> <lon>"),
            },
            "manual" => match parse_pair(rest) {
                Some((lat, lon)) => {
                    if let Err(e) = coordinator.manual_entry(lat, lon) {
                        println!("{e}");
                    }
                }
                None => println!("usage: manual <lat> <lon>"),
            },
            "map" => render_map(coordinator),
            "quit" | "exit" => break,
            "help" => print_help(),
            other => println!("unknown command: {other}"),
        }
    }
}

fn render_map(coordinator: &Coordinator) {
    println!(
        "center {} zoom {}",
        coordinator.map_center(),
        coordinator.map_zoom()
    );
    for marker in coordinator.markers() {
        println!("  [{}] {} @ {}", marker.id, marker.label, marker.coordinate);
    }
}

fn parse_pair(s: &str) -> Option<(f64, f64)> {
    let mut parts = s.split_whitespace();
    let lat = parts.next()?.parse().ok()?;
    let lon = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((lat, lon))
}
