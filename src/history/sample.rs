use log::info;

use super::{ HistoryStore, StoreError };
use crate::models::chat::{
    Activity,
    Conversation,
    ItineraryDay,
    MapLocation,
    MessagePayload,
    NewMessage,
};

pub const SAMPLE_TRIP_TITLE: &str = "5 Days in Tokyo";

fn day(day: u32, activities: &[(&str, &str, &str)]) -> ItineraryDay {
    ItineraryDay {
        day,
        activities: activities
            .iter()
            .map(|(time, description, location)| Activity {
                time: time.to_string(),
                description: description.to_string(),
                location: location.to_string(),
            })
            .collect(),
    }
}

fn first_day() -> ItineraryDay {
    day(1, &[
        ("Morning", "Sushi experience at Tsukiji Market", "Tsukiji Market"),
        ("Afternoon", "Visit Senso-ji Temple", "Senso-ji Temple"),
        ("Evening", "Tokyo Skytree night view", "Tokyo Skytree"),
    ])
}

fn sample_thread(conversation_id: &str) -> Vec<NewMessage> {
    let full_itinerary = vec![
        first_day(),
        day(2, &[
            ("Morning", "Visit Meiji Shrine", "Meiji Shrine"),
            ("Afternoon", "Harajuku shopping experience", "Takeshita Street"),
            ("Evening", "Shibuya nightlife", "Shibuya Station"),
        ]),
        day(3, &[("Full day", "Tokyo Disneyland", "Tokyo Disneyland")]),
        day(4, &[
            ("Morning", "Akihabara electronics district", "Akihabara"),
            ("Afternoon", "Ginza shopping", "Ginza"),
            ("Evening", "Roppongi dining", "Roppongi"),
        ]),
        day(5, &[
            ("Morning", "Imperial Palace Gardens", "Imperial Palace"),
            ("Afternoon", "Ueno Park museums", "Ueno Park"),
            ("Evening", "Departure", "Haneda Airport"),
        ])
    ];

    vec![
        NewMessage::user(
            conversation_id,
            "Hi, I'd like to plan a 5-day trip to Tokyo, focusing on local food and attractions."
        ),
        NewMessage::ai(
            conversation_id,
            "Hello! I'd be happy to help plan your Tokyo trip. Tokyo is a city where food and culture \
come together beautifully. Do you have any specific places you'd like to visit or Japanese dishes \
you'd like to try?"
        ),
        NewMessage::user(
            conversation_id,
            "I really want to try fresh sushi at Tsukiji Market, and I'd love to visit Senso-ji Temple and Meiji Shrine."
        ),
        NewMessage::ai(
            conversation_id,
            "Great choices! I've created an initial itinerary based on your interests:"
        ).with_payload(MessagePayload::Itinerary { itinerary: vec![first_day()] }),
        NewMessage::user(
            conversation_id,
            "These places sound great! What's the best time to visit Tsukiji Market?"
        ),
        NewMessage::ai(
            conversation_id,
            "I recommend arriving at Tsukiji Market between 5:30-6:00 AM because:\n\
1. You'll see the freshest seafood\n\
2. Popular sushi restaurants often fill up before 11 AM\n\
3. You'll avoid tourist crowds for a better experience\n\n\
Let me mark the location for you:"
        ).with_payload(MessagePayload::Locations {
            locations: vec![MapLocation {
                name: "Tsukiji Market".to_string(),
                description: "One of the world's largest fish markets, famous for fresh sushi".to_string(),
                coordinates: [139.7691, 35.6654],
            }],
        }),
        NewMessage::user(conversation_id, "I see, what about the itinerary for the other days?"),
        NewMessage::ai(
            conversation_id,
            "Let me plan out the full 5-day itinerary for you:"
        ).with_payload(MessagePayload::Itinerary { itinerary: full_itinerary })
    ]
}

/// Writes the sample Tokyo trip for `owner_id`, structured replies included.
pub async fn seed_sample_trip(
    store: &dyn HistoryStore,
    owner_id: &str
) -> Result<Conversation, StoreError> {
    let conversation = store.create_conversation(owner_id, SAMPLE_TRIP_TITLE).await?;
    for message in sample_thread(&conversation.id) {
        store.add_message(message).await?;
    }
    store.get_conversation(&conversation.id).await
}

/// Seeds the sample trip only for an owner without conversations.
pub async fn seed_if_empty(
    store: &dyn HistoryStore,
    owner_id: &str
) -> Result<Option<Conversation>, StoreError> {
    if !store.list_conversations(owner_id).await?.is_empty() {
        info!("Owner {} already has conversations, skipping the sample trip", owner_id);
        return Ok(None);
    }
    let conversation = seed_sample_trip(store, owner_id).await?;
    info!("Seeded sample trip {} for owner {}", conversation.id, owner_id);
    Ok(Some(conversation))
}
