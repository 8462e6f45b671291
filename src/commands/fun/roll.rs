use async_trait::async_trait;
use rand::Rng;

use crate::command::SlashCommand;
use crate::context::AppContext;
use crate::error::HandlerResult;
use crate::interaction::InteractionHandle;
use crate::types::*;

const DEFAULT_SIDES: i64 = 6;
const MIN_SIDES: i64 = 2;
const MAX_SIDES: i64 = 1000;

/// `/roll [sides]`
pub struct Roll;

#[async_trait]
impl SlashCommand for Roll {
    fn data(&self) -> ApplicationCommand {
        ApplicationCommandBuilder::chat_input("roll", "Roll a dice")
            .option(ApplicationCommandOption {
                name: "sides".to_string(),
                description: "Number of sides (default: 6)".to_string(),
                kind: CommandOptionType::Integer,
                required: false,
                choices: Vec::new(),
                min_value: Some(MIN_SIDES),
                max_value: Some(MAX_SIDES),
            })
            .build()
    }

    async fn execute(&self, _ctx: &AppContext, interaction: &InteractionHandle) -> HandlerResult {
        let sides = interaction
            .data()
            .and_then(|d| d.option_i64("sides"))
            .unwrap_or(DEFAULT_SIDES)
            .clamp(MIN_SIDES, MAX_SIDES);
        let result = roll(sides, &mut rand::thread_rng());

        let text = format!("🎲 Rolling a d{sides}... **{result}**!");
        interaction.reply(InteractionCallbackData::text(text)).await?;
        Ok(())
    }
}

fn roll(sides: i64, rng: &mut impl Rng) -> i64 {
    rng.gen_range(1..=sides)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    use super::*;
    use crate::command::CommandRegistry;
    use crate::testing::{command_interaction_with, context, RecordingApi, Sent};

    #[test]
    fn rolls_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let r = roll(6, &mut rng);
            assert!((1..=6).contains(&r));
        }
    }

    #[test]
    fn schema_bounds_sides() {
        let data = Roll.data();
        assert_eq!(data.options[0].min_value, Some(2));
        assert_eq!(data.options[0].max_value, Some(1000));
    }

    #[tokio::test]
    async fn clamps_out_of_range_sides() {
        let api = RecordingApi::new();
        let ctx = context(api.clone(), CommandRegistry::default());
        let interaction = command_interaction_with("roll", json!([{ "name": "sides", "type": 4, "value": 1 }]));
        let handle = InteractionHandle::new(interaction, api.clone());

        Roll.execute(&ctx, &handle).await.unwrap();

        assert!(matches!(
            &api.sent()[0],
            Sent::Response { content: Some(c), .. } if c.starts_with("🎲 Rolling a d2...")
        ));
    }
}
