mod bean;
mod brew;
mod helpers;
mod queue;
mod suggest;

pub(crate) use bean::{
    cmd_bean_add, cmd_bean_delete, cmd_bean_list, cmd_bean_show, cmd_bean_update, parse_roast,
};
pub(crate) use brew::{BrewParamArgs, cmd_brew_delete, cmd_brew_list, cmd_brew_log};
pub(crate) use queue::{cmd_migrate, cmd_onboarding, cmd_pending, cmd_sync};
pub(crate) use suggest::{cmd_methods, cmd_ratio, cmd_suggest};
