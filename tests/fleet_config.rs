//! The shipped fleet configuration routes and redirects as deployed.

use std::path::Path;

use transit_gateway::config::{load_config, Scheme};
use transit_gateway::routing::redirect::{enforce, RedirectDecision};
use transit_gateway::routing::{resolve, RequestPath, RuleTable};

fn fleet() -> RuleTable {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gateway.toml");
    RuleTable::from_config(&load_config(&path).unwrap()).unwrap()
}

fn backend(table: &RuleTable, host: &str, path: &str) -> String {
    resolve(table, host, &RequestPath::new(path))
        .unwrap()
        .backend
        .to_string()
}

fn redirect(table: &RuleTable, host: &str, scheme: Scheme, path: &str) -> Option<String> {
    match enforce(table, host, scheme, &RequestPath::new(path), None) {
        RedirectDecision::Redirect { location } => Some(location),
        RedirectDecision::Pass => None,
    }
}

#[test]
fn test_api_routes() {
    let table = fleet();
    let api = "api.opentransport.ro";
    let cases = [
        ("/geocoding/v1/", "pelias-api:8080"),
        ("/graphiql/hsl", "graphiql:8080"),
        ("/realtime/trip-updates/v1/FOLI", "siri2gtfsrt:8080"),
        ("/realtime/vehicle-positions/v1/", "navigator-server:8080"),
        ("/realtime/raildigitraffic2gtfsrt/v1/", "raildigitraffic2gtfsrt:8080"),
        ("/map/v1/", "hsl-map-server:8080"),
        ("/routing/v1/routers/finland", "opentripplanner-finland:8080"),
        ("/routing/v1/routers/hsl", "opentripplanner-hsl:8080"),
        ("/routing/v1/routers/waltti", "opentripplanner-waltti:8080"),
        ("/routing-data/v2/hsl/router-hsl.zip", "opentripplanner-data-con-hsl:8080"),
        ("/routing-data/v2/waltti/router-waltti.zip", "opentripplanner-data-con-waltti:8080"),
        ("/routing-data/v2/finland/router-finland.zip", "opentripplanner-data-con-finland:8080"),
        ("/ui/v1/finland/sw.js", "digitransit-ui-default:8080"),
        ("/ui/v1/waltti/sw.js", "digitransit-ui-waltti:8080"),
        ("/ui/v1/hsl/sw.js", "digitransit-ui-hsl:8080"),
        ("/ui/v1/hsl-next/sw.js", "digitransit-ui-hsl-next:8080"),
        ("/timetables/v1/hsl/stops/1010105.pdf", "hsl-timetable-container:8080"),
    ];
    for (path, expected) in cases {
        assert_eq!(backend(&table, api, path), expected, "{}", path);
        assert_eq!(redirect(&table, api, Scheme::Http, path), None);
    }
}

#[test]
fn test_dev_api_routes_rewrite_to_production_paths() {
    let table = fleet();
    let target = resolve(
        &table,
        "dev-api.opentransport.ro",
        &RequestPath::new("/routing/v1/routers/next-hsl/index/graphql"),
    )
    .unwrap();
    assert_eq!(target.backend.to_string(), "opentripplanner-hsl:8080");
    assert_eq!(target.upstream_path, "/routing/v1/routers/hsl/index/graphql");

    let target = resolve(
        &table,
        "dev-api.opentransport.ro",
        &RequestPath::new("/routing-data/v2/next-waltti/router-config.json"),
    )
    .unwrap();
    assert_eq!(target.backend.to_string(), "opentripplanner-data-con-waltti:8080");
    assert_eq!(target.upstream_path, "/routing-data/v2/waltti/router-config.json");
    assert!(target.cors);
}

#[test]
fn test_router_config_has_cors() {
    let table = fleet();
    for router in ["hsl", "waltti", "finland"] {
        let path = format!("/routing-data/v2/{}/router-config.json", router);
        assert!(resolve(&table, "api.opentransport.ro", &RequestPath::new(&path)).unwrap().cors);
    }
}

#[test]
fn test_external_sources_are_cached() {
    let table = fleet();
    let target = resolve(
        &table,
        "api.opentransport.ro",
        &RequestPath::new("/out/p.hsl.fi/api/v1/facilities.json"),
    )
    .unwrap();
    assert_eq!(target.backend.to_string(), "p.hsl.fi:80");
    assert_eq!(target.upstream_path, "/api/v1/facilities.json");
    assert!(target.cacheable);
}

#[test]
fn test_hsl_redirects() {
    let table = fleet();
    let expect = |host: &str, scheme, path: &str, location: &str| {
        assert_eq!(redirect(&table, host, scheme, path).as_deref(), Some(location), "{}{}", host, path);
    };

    expect("www.beta.reittiopas.fi", Scheme::Http, "/kissa", "http://beta.reittiopas.fi/kissa");
    expect("reittiopas.fi", Scheme::Http, "/kissa", "https://reittiopas.hsl.fi/kissa");
    expect("beta.reittiopas.fi", Scheme::Https, "/kissa", "https://reittiopas.hsl.fi/kissa");
    expect("www.reittiopas.fi", Scheme::Https, "/kissa", "https://reittiopas.hsl.fi/kissa");
    expect("m.reittiopas.fi", Scheme::Http, "/kissa", "https://reittiopas.hsl.fi/kissa");
    expect("vyohykereittiopas.hsl.fi", Scheme::Http, "/kissa", "https://reittiopas.hsl.fi/kissa");
    expect("dev.reittiopas.fi", Scheme::Http, "/kissa", "https://dev.reittiopas.fi/kissa");
    expect("reittiopas.hsl.fi", Scheme::Https, "/uudetvyohykkeet", "https://reittiopas.hsl.fi");
    expect("reittiopas.hsl.fi", Scheme::Https, "/uudetvy%C3%B6hykkeet", "https://reittiopas.hsl.fi");
    expect("www.next-dev.opentransport.ro", Scheme::Http, "/kissa", "http://next-dev.opentransport.ro/kissa");
    expect("next-dev.opentransport.ro", Scheme::Http, "/kissa", "https://next-dev.opentransport.ro/kissa");
    expect("www.opas.matka.fi", Scheme::Http, "/kissa", "http://opas.matka.fi/kissa");
    expect("opas.matka.fi", Scheme::Http, "/kissa", "https://opas.matka.fi/kissa");

    assert_eq!(redirect(&table, "reittiopas.hsl.fi", Scheme::Https, "/"), None);
    assert_eq!(redirect(&table, "opas.matka.fi", Scheme::Https, "/kissa"), None);
    assert_eq!(redirect(&table, "beta.opentransport.ro", Scheme::Https, "/kissa"), None);
}

#[test]
fn test_ui_sites() {
    let table = fleet();
    assert_eq!(backend(&table, "reittiopas.hsl.fi", "/"), "digitransit-ui-hsl:8080");
    assert_eq!(backend(&table, "dev.reittiopas.fi", "/"), "digitransit-ui-hsl:8080");
    assert_eq!(backend(&table, "next-dev.opentransport.ro", "/"), "digitransit-ui-hsl-next:8080");
    assert_eq!(backend(&table, "opas.matka.fi", "/"), "digitransit-ui-default:8080");
    assert_eq!(backend(&table, "opentransport.ro", "/"), "digitransit-site:8080");
    assert_eq!(
        backend(&table, "sentry-analytics.opentransport.ro", "/"),
        "digitransit-sentry-analytics:8080"
    );

    for host in ["reittiopas.hsl.fi", "opas.matka.fi", "reittiopas.tampere.fi"] {
        assert!(resolve(&table, host, &RequestPath::new("/sw.js")).unwrap().cacheable, "{}", host);
        assert!(!resolve(&table, host, &RequestPath::new("/")).unwrap().cacheable, "{}", host);
    }
    for host in ["yleisviesti.hsl.fi", "dev-yleisviesti.opentransport.ro"] {
        let target = resolve(&table, host, &RequestPath::new("/")).unwrap();
        assert_eq!(target.backend.to_string(), "yleisviestipalvelu:8080");
        assert!(target.cacheable);
    }
}

#[test]
fn test_waltti_cities() {
    let table = fleet();
    let cities = [
        "hameenlinna", "jyvaskyla", "joensuu", "kotka", "kuopio", "lahti", "lappeenranta",
        "mikkeli", "oulu", "turku", "tampere", "kouvola", "rovaniemi", "salo",
    ];
    let mut hosts: Vec<String> = cities
        .iter()
        .flat_map(|city| [format!("{}.opentransport.ro", city), format!("dev-{}.opentransport.ro", city)])
        .collect();
    hosts.extend(
        [
            "reittiopas.foli.fi",
            "reittiopas.hameenlinna.fi",
            "pilottirepa.tampere.fi",
            "repa.tampere.fi",
            "reittiopas.tampere.fi",
            "reittiopas.salo.fi",
        ]
        .map(String::from),
    );

    for host in &hosts {
        assert_eq!(
            redirect(&table, host, Scheme::Http, "/kissa"),
            Some(format!("https://{}/kissa", host))
        );
        assert_eq!(redirect(&table, host, Scheme::Https, "/kissa"), None);
        assert_eq!(backend(&table, host, "/"), "digitransit-ui-waltti:8080");
    }
}
