use yadavar_domain::{Category, NotificationPayload, PayloadButton, Reminder};

/// Engine-emitted phrases. The full per-deployment string tables live with
/// the transport adapter; only the keys the dispatcher itself renders are
/// kept here.
fn t<'a>(language: &str, key: &'a str) -> &'a str {
    let localized = match (language, key) {
        ("fa", "medicine_reminder") => Some("💊 وقت داروی شماست: {content}"),
        ("fa", "birthday_main") => Some("🎂 امروز تولد {content} است!"),
        ("fa", "birthday_congratulate") => Some("اولین تبریک را شما بگویید 🎉"),
        ("fa", "birthday_week_before") => Some("📅 یک هفته تا تولد {content}"),
        ("fa", "birthday_three_days") => Some("📅 سه روز تا تولد {content}"),
        ("fa", "installment_retry") => Some("یادآوری دوباره قسط"),
        ("fa", "medicine_taken") => Some("✅ مصرف شد"),
        ("fa", "installment_paid") => Some("💰 پرداخت شد"),
        ("fa", "stop_reminder") => Some("⏹ دیگر یادآوری نکن"),

        ("ar", "medicine_reminder") => Some("💊 حان وقت دوائك: {content}"),
        ("ar", "birthday_main") => Some("🎂 اليوم عيد ميلاد {content}!"),
        ("ar", "birthday_congratulate") => Some("كن أول من يهنئ 🎉"),
        ("ar", "birthday_week_before") => Some("📅 أسبوع على عيد ميلاد {content}"),
        ("ar", "birthday_three_days") => Some("📅 ثلاثة أيام على عيد ميلاد {content}"),
        ("ar", "installment_retry") => Some("تذكير بالقسط"),
        ("ar", "medicine_taken") => Some("✅ تم التناول"),
        ("ar", "installment_paid") => Some("💰 تم الدفع"),
        ("ar", "stop_reminder") => Some("⏹ أوقف التذكير"),

        ("ru", "medicine_reminder") => Some("💊 Время принять лекарство: {content}"),
        ("ru", "birthday_main") => Some("🎂 Сегодня день рождения: {content}!"),
        ("ru", "birthday_congratulate") => Some("Поздравьте первым 🎉"),
        ("ru", "birthday_week_before") => Some("📅 Неделя до дня рождения: {content}"),
        ("ru", "birthday_three_days") => Some("📅 Три дня до дня рождения: {content}"),
        ("ru", "installment_retry") => Some("Повторное напоминание о платеже"),
        ("ru", "medicine_taken") => Some("✅ Принято"),
        ("ru", "installment_paid") => Some("💰 Оплачено"),
        ("ru", "stop_reminder") => Some("⏹ Больше не напоминать"),

        _ => None,
    };
    localized.unwrap_or(match key {
        "medicine_reminder" => "💊 Time for your medicine: {content}",
        "birthday_main" => "🎂 Today is {content}'s birthday!",
        "birthday_congratulate" => "Be the first to congratulate 🎉",
        "birthday_week_before" => "📅 One week until {content}'s birthday",
        "birthday_three_days" => "📅 Three days until {content}'s birthday",
        "installment_retry" => "Payment reminder",
        "medicine_taken" => "✅ Taken",
        "installment_paid" => "💰 Paid",
        "stop_reminder" => "⏹ Stop reminding",
        other => other,
    })
}

/// Render the category-specific notification for a due reminder.
pub fn build_payload(reminder: &Reminder, language: &str) -> NotificationPayload {
    let content = reminder.content.as_str();
    let text = match reminder.category {
        Category::Medicine => t(language, "medicine_reminder").replace("{content}", content),
        Category::Birthday => format!(
            "{}\n{}",
            t(language, "birthday_main").replace("{content}", content),
            t(language, "birthday_congratulate"),
        ),
        Category::BirthdayPreWeek => {
            t(language, "birthday_week_before").replace("{content}", content)
        }
        Category::BirthdayPreThree => {
            t(language, "birthday_three_days").replace("{content}", content)
        }
        Category::InstallmentRetry => {
            format!("💳⚠️ {}: {}", t(language, "installment_retry"), content)
        }
        other => format!("{} {}", other.emoji(), content),
    };

    let actions = reminder
        .category
        .actions(reminder.id)
        .into_iter()
        .map(|action| PayloadButton {
            label: t(language, action.label_key).to_string(),
            callback: action.callback,
        })
        .collect();

    NotificationPayload { text, actions }
}
