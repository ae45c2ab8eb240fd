//! Deterministic offline catalog used when every live source comes back empty.

use crate::geo::distance_between;
use crate::types::{CategoryId, Coordinates, Opportunity};

pub const FALLBACK_SOURCE: &str = "Local Database";

struct Template {
    title: &'static str,
    organization: &'static str,
    category: CategoryId,
    description: &'static str,
    schedule: &'static str,
    /// Offset from the search origin in degrees (lat, lng)
    offset: (f64, f64),
}

const TEMPLATES: &[Template] = &[
    Template {
        title: "Food Bank Distribution Center",
        organization: "{location} Community Food Bank",
        category: CategoryId::Food,
        description: "Help sort, pack, and distribute food to families facing food insecurity. Make a direct impact on hunger in our community.",
        schedule: "Tuesdays & Thursdays: 10 AM - 2 PM, Saturdays: 9 AM - 1 PM",
        offset: (0.012, -0.018),
    },
    Template {
        title: "Animal Shelter Care Assistant",
        organization: "{location} Animal Rescue",
        category: CategoryId::Animals,
        description: "Provide care and companionship to shelter animals. Activities include walking dogs, socializing cats, and helping with adoption events.",
        schedule: "Daily shifts available: 8 AM - 12 PM or 1 PM - 5 PM",
        offset: (-0.021, 0.009),
    },
    Template {
        title: "Youth Literacy Mentor",
        organization: "Reading Partners",
        category: CategoryId::Education,
        description: "Work one-on-one with elementary students to improve their reading skills. No teaching experience required - just patience and enthusiasm!",
        schedule: "After school hours: 3:00 PM - 5:00 PM, Monday-Thursday",
        offset: (0.030, 0.025),
    },
    Template {
        title: "Community Garden Volunteer",
        organization: "Green Spaces Initiative",
        category: CategoryId::Environment,
        description: "Help maintain community gardens that provide fresh produce to local food banks. Learn sustainable gardening practices!",
        schedule: "Saturdays: 9 AM - 12 PM, Wednesdays: 5 PM - 7 PM",
        offset: (-0.008, -0.035),
    },
    Template {
        title: "Senior Center Activity Assistant",
        organization: "{location} Senior Services",
        category: CategoryId::Seniors,
        description: "Lead activities, games, and conversations with senior citizens. Help combat loneliness and bring joy to their day.",
        schedule: "Weekdays: 10 AM - 2 PM, flexible scheduling",
        offset: (0.041, -0.004),
    },
    Template {
        title: "Homeless Outreach Volunteer",
        organization: "Housing First Coalition",
        category: CategoryId::Homeless,
        description: "Distribute supplies, serve meals, and connect individuals experiencing homelessness with resources and support services.",
        schedule: "Friday evenings: 6 PM - 8 PM, Sunday mornings: 8 AM - 11 AM",
        offset: (-0.037, 0.031),
    },
    Template {
        title: "Hospital Patient Companion",
        organization: "{location} Medical Center",
        category: CategoryId::Health,
        description: "Provide comfort and companionship to hospital patients. Activities include reading, conversation, and light assistance.",
        schedule: "Minimum 4-hour shifts, weekdays and weekends available",
        offset: (0.019, 0.044),
    },
    Template {
        title: "After-School Program Helper",
        organization: "Boys & Girls Club",
        category: CategoryId::Children,
        description: "Assist with homework help, sports activities, and arts & crafts for children ages 6-14 in our after-school program.",
        schedule: "Monday-Friday: 3:00 PM - 6:00 PM",
        offset: (-0.046, -0.022),
    },
];

/// Build the catalog around `origin`. Categories are the templates' own, not re-scored.
pub fn catalog(location_label: &str, origin: &Coordinates) -> Vec<Opportunity> {
    TEMPLATES
        .iter()
        .enumerate()
        .map(|(index, t)| {
            let organization = t.organization.replace("{location}", location_label);
            let coordinates = Coordinates::new(origin.lat + t.offset.0, origin.lng + t.offset.1);
            Opportunity {
                id: format!("fallback-{}", index + 1),
                title: t.title.to_string(),
                website: Some(format!(
                    "{}.org",
                    organization
                        .to_lowercase()
                        .chars()
                        .filter(|c| c.is_ascii_alphanumeric())
                        .collect::<String>()
                )),
                organization,
                description: t.description.to_string(),
                category: t.category,
                address: format!("{} Main Street, {}", 100 + index * 50, location_label),
                distance_miles: Some(distance_between(origin, &coordinates)),
                coordinates: Some(coordinates),
                posting_date: None,
                remote_option: false,
                source: FALLBACK_SOURCE.to_string(),
                schedule: Some(t.schedule.to_string()),
            }
        })
        .collect()
}
