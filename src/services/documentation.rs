use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the mini-app backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::farm::start_harvest,
        crate::routes::farm::farm_status,
        crate::routes::farm::claim_points,
        crate::routes::users::register,
        crate::routes::users::me,
        crate::routes::quests::daily_status,
        crate::routes::quests::claim_daily,
        crate::routes::quests::referral_statuses,
        crate::routes::quests::referral_status,
        crate::routes::quests::claim_referral,
        crate::routes::store::energy_recharge,
        crate::routes::store::custom_ball_skin,
        crate::routes::store::custom_ball_hit_reward,
        crate::routes::store::webhook,
        crate::routes::admin::reset_energy,
        crate::routes::admin::create_referral_quest,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::farm::HarvestResponse,
            crate::dto::farm::FarmStatusResponse,
            crate::dto::farm::ClaimResponse,
            crate::dto::user::RegisterRequest,
            crate::dto::user::UserResponse,
            crate::dto::quest::DayRewardResponse,
            crate::dto::quest::DailyQuestResponse,
            crate::dto::quest::QuestClaimResponse,
            crate::dto::quest::CreateReferralQuestRequest,
            crate::dto::quest::ReferralQuestResponse,
            crate::dto::quest::ReferralQuestStatusResponse,
            crate::dto::store::InvoiceLinkResponse,
            crate::dto::store::ResetEnergyResponse,
            crate::dto::store::TelegramUpdate,
            crate::dto::ws::ArcadeInboundMessage,
            crate::dto::ws::ArcadeOutboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "farm", description = "Harvest cooldown minigame"),
        (name = "users", description = "Registration and profiles"),
        (name = "quests", description = "Daily bonus and referral milestones"),
        (name = "store", description = "Telegram Stars purchases"),
        (name = "admin", description = "Operator endpoints"),
        (name = "arcade", description = "WebSocket ball-tap arcade"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_surface() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/farm/harvest",
            "/farm/status",
            "/farm/claim",
            "/users/register",
            "/users/me",
            "/store/webhook",
            "/admin/{telegram_id}/reset-energy",
            "/admin/referral-quests",
            "/quests/daily",
            "/quests/daily/claim",
            "/quests/referral",
            "/quests/referral/{quest_id}",
            "/quests/referral/{quest_id}/claim",
            "/ws/{telegram_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
