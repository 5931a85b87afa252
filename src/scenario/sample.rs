//! Built-in sample scenario for the PC-parts demo app on a phone emulator
//!
//! The app exposes Compose test tags as resource ids, so every element is
//! addressed with [`Selector::tag`].

use std::time::Duration;

use crate::common::Result;

use super::{Scenario, ScenarioBuilder, Selector, StepBuilder};

/// Name under which the sample is registered in the catalog
pub const SAMPLE_SCENARIO_NAME: &str = "emu_phone_sample";

const SHORT_WAIT: Duration = Duration::from_millis(250);

fn tap(tag: &str) -> StepBuilder {
    StepBuilder::tap(Selector::tag(tag))
}

fn tap_child(tag: &str, index: u32) -> StepBuilder {
    StepBuilder::tap_child(Selector::tag(tag), index)
}

pub fn sample_scenario() -> Result<Scenario> {
    let mut builder = Scenario::builder();
    top_screen(&mut builder);
    parts_screens(&mut builder);
    assembly_screens(&mut builder);
    motherboard_flow(&mut builder);
    builder.build()
}

fn top_screen(b: &mut ScenarioBuilder) {
    b.push(tap("start_button").screenshot("start_dialog"));
    b.push(
        StepBuilder::input_text(Selector::tag("assembly_name_text_field"), "test assembly")
            .screenshot("start_dialog_input_text"),
    );
    b.push(tap("create_assembly_button").screenshot("select_parts_type"));
    b.push(tap("pccase").screenshot("parts_pc_case_list"));
}

fn parts_screens(b: &mut ScenarioBuilder) {
    b.push(
        StepBuilder::scroll(Some(Selector::tag("unselected_parts_list")))
            .repeat(3)
            .screenshot("parts_pc_case_scrolled"),
    );
    b.push(tap_child("unselected_parts_list", 2).screenshot("parts_pc_case_add_dialog"));
    b.push(tap("edit_assembly_button").screenshot("assembly_list"));
}

fn assembly_screens(b: &mut ScenarioBuilder) {
    b.push(tap("pccase").screenshot("assembly_dialog_pc_case"));

    // plus, minus, plus, then apply
    b.push(tap("plus_button").wait(SHORT_WAIT));
    b.push(tap("minus_button").wait(SHORT_WAIT));
    b.push(tap("plus_button").wait(SHORT_WAIT));
    b.push(tap("edit_assembly_button").screenshot("assembly_list_2_items"));

    b.push(tap("DeviceScreen").screenshot("parts_pc_case_list_added_item"));
    b.push(tap("TopScreen").screenshot("top_composition_exists"));
    b.push(tap("test assembly").screenshot("top_edit_composition_dialog"));
    b.push(tap("add_parts_button").screenshot("select_parts_type_2"));

    b.push(StepBuilder::scroll(None));
    b.push(tap("mouse").screenshot("parts_mouse_list"));
    b.push(StepBuilder::scroll(Some(Selector::tag("unselected_parts_list"))).repeat(2));
    b.push(tap_child("unselected_parts_list", 4).screenshot("parts_mouse_add_dialog"));
    b.push(tap("edit_assembly_button").screenshot("assembly_list_3_items"));
    b.push(tap("SelectionScreen").screenshot("select_parts_type_3"));
}

fn motherboard_flow(b: &mut ScenarioBuilder) {
    b.push(tap("motherboard").screenshot("parts_motherboard_list"));

    b.push(tap("sort_menu_button").screenshot("sort_menu_popularity_selected"));
    b.push(tap("NEW_ARRIVAL").screenshot("parts_motherboard_list_new_arrival_sort"));
    b.push(tap("sort_menu_button").screenshot("sort_menu_new_arrival_selected"));
    b.push(tap("PRICE_ASC").screenshot("parts_motherboard_list_price_asc_sort"));

    b.push(tap("search_text_field").wait(SHORT_WAIT));
    b.push(StepBuilder::input_text(Selector::tag("search_text_field"), "asus").wait(SHORT_WAIT));
    b.push(StepBuilder::hide_keyboard().screenshot("parts_motherboard_list_search_asus"));

    b.push(tap_child("unselected_parts_list", 0).screenshot("parts_motherboard_add_dialog"));
    b.push(tap("edit_assembly_button").screenshot("assembly_list_4_items"));

    b.push(tap("mouse").screenshot("assembly_dialog_mouse"));
    b.push(tap("delete_assembly_button").screenshot("assembly_list_mouse_deleted"));
    b.push(tap("DeviceScreen").screenshot("parts_motherboard_list_added_item"));

    b.push(tap_child("selected_parts_list", 0).screenshot("parts_motherboard_edit_dialog"));
    b.push(tap("delete_assembly_button").screenshot("parts_motherboard_list_deleted"));
    b.push(tap("AssemblyScreen").screenshot("assembly_list_motherboard_deleted"));
}
