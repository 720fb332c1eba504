//! Reference rankings and calendars for the sports section.

use rocket::serde::json::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    id: &'static str,
    rank: u32,
    athlete_name: &'static str,
    points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_name: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: &'static str,
    event_name: &'static str,
    date: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'static str>,
}

const fn ranking(
    id: &'static str,
    rank: u32,
    athlete_name: &'static str,
    points: u32,
    team_name: Option<&'static str>,
) -> Ranking {
    Ranking {
        id,
        rank,
        athlete_name,
        points,
        team_name,
    }
}

const fn event(id: &'static str, event_name: &'static str, date: &'static str, location: &'static str) -> Event {
    Event {
        id,
        event_name,
        date,
        location: Some(location),
    }
}

static CYCLING_RANKINGS: [Ranking; 4] = [
    ranking("c1", 1, "Tadej Pogačar", 8500, Some("UAE Team Emirates")),
    ranking("c2", 2, "Jonas Vingegaard", 7950, Some("Visma")),
    ranking("c3", 3, "Remco Evenepoel", 7200, Some("Soudal Quick-Step")),
    ranking("c4", 4, "Primoz Roglic", 7050, Some("Red Bull - BORA")),
];

static TENNIS_RANKINGS: [Ranking; 3] = [
    ranking("t1", 1, "Jannik Sinner", 10500, None),
    ranking("t2", 2, "Carlos Alcaraz", 9800, None),
    ranking("t3", 3, "Novak Djokovic", 9200, None),
];

static F1_RANKINGS: [Ranking; 4] = [
    ranking("f1-1", 1, "Lando Norris", 390, Some("McLaren")),
    ranking("f1-2", 2, "Oscar Piastri", 366, Some("McLaren")),
    ranking("f1-3", 3, "Max Verstappen", 366, Some("Red Bull Racing")),
    ranking("f1-4", 4, "George Russell", 294, Some("Mercedes")),
];

static CYCLING_EVENTS: [Event; 3] = [
    event("e1", "Tour de France 2026", "2026-07-04", "France"),
    event("e2", "Vuelta a España 2026", "2026-08-22", "Spain"),
    event("e3", "Giro d'Italia 2026", "2026-05-09", "Italy"),
];

static TENNIS_EVENTS: [Event; 4] = [
    event("e4", "Australian Open", "2026-01-19", "Melbourne"),
    event("e5", "Roland Garros", "2026-05-24", "Paris"),
    event("e6", "Wimbledon", "2026-06-29", "London"),
    event("e7", "US Open", "2026-08-31", "New York"),
];

static F1_EVENTS: [Event; 2] = [
    event("e8", "Qatar GP", "2025-11-30", "Lusail International Circuit"),
    event("e9", "Abu Dhabi GP", "2025-12-07", "Yas Marina Circuit"),
];

pub fn rankings_for(sport: &str) -> &'static [Ranking] {
    match sport {
        "cycling" => &CYCLING_RANKINGS,
        "tennis" => &TENNIS_RANKINGS,
        "f1" => &F1_RANKINGS,
        _ => &[],
    }
}

pub fn events_for(sport: &str) -> &'static [Event] {
    match sport {
        "cycling" => &CYCLING_EVENTS,
        "tennis" => &TENNIS_EVENTS,
        "f1" => &F1_EVENTS,
        _ => &[],
    }
}

#[get("/public/rankings/<sport>")]
pub fn rankings(sport: &str) -> Json<&'static [Ranking]> {
    Json(rankings_for(sport))
}

#[get("/public/events/<sport>")]
pub fn events(sport: &str) -> Json<&'static [Event]> {
    Json(events_for(sport))
}
