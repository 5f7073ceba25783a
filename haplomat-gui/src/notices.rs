use std::collections::VecDeque;

use eframe::egui;
use egui::{Align2, Color32, RichText};

use haplomat_core::notice::{NoticeKind, UserNotice};

fn kind_label(kind: NoticeKind) -> RichText {
    match kind {
        NoticeKind::Info => RichText::new("ℹ").color(Color32::from_rgb(31, 119, 180)),
        NoticeKind::Warning => RichText::new("⚠").color(Color32::from_rgb(230, 140, 0)),
        NoticeKind::Error => RichText::new("⛔").color(Color32::from_rgb(207, 34, 46)),
    }
    .size(24.0)
}

/// Shows the oldest pending notice until it is dismissed.
pub fn show_notice(ctx: &egui::Context, notices: &mut VecDeque<UserNotice>) {
    let Some(notice) = notices.front() else {
        return;
    };

    let mut dismissed = false;
    egui::Window::new(notice.title.as_str())
        .id(egui::Id::new("notice"))
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(kind_label(notice.kind));
                ui.label(notice.body.as_str());
            });
            ui.add_space(5.0);
            if ui.button("OK").clicked() {
                dismissed = true;
            }
        });

    if dismissed {
        notices.pop_front();
    }
}

/// `Some(true)` once quitting is confirmed, `Some(false)` when it is called off.
pub fn quit_window(ctx: &egui::Context) -> Option<bool> {
    let mut answer = None;
    egui::Window::new("Quit")
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label("A process is still running. Stop it and quit?");
            ui.horizontal(|ui| {
                if ui.button("Yes").clicked() {
                    answer = Some(true);
                }
                if ui.button("No").clicked() {
                    answer = Some(false);
                }
            });
        });
    answer
}
