mod card;
mod helpers;
mod ingredient;
mod schedule;

pub(crate) use card::{
    cmd_card_create, cmd_card_delete, cmd_card_list, cmd_card_preview, cmd_card_show,
    cmd_card_slot, cmd_card_stale, cmd_card_update,
};
pub(crate) use ingredient::{
    cmd_ingredient_add, cmd_ingredient_list, cmd_ingredient_refs, cmd_ingredient_remove,
};
pub(crate) use schedule::{
    cmd_schedule_day, cmd_schedule_move, cmd_schedule_place, cmd_schedule_remove,
    cmd_schedule_show,
};
