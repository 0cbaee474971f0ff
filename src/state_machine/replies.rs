//! Chat reply templates
//!
//! WhatsApp renders `*text*` as bold.

use crate::datastore::{Appointment, Confirmation, DocumentType};
use std::fmt::Write;

const ANOTHER_QUERY: &str = "Si deseas otra consulta, escribe: *Cita*.";

fn document_codes() -> String {
    DocumentType::ALL
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}

pub fn greeting() -> String {
    "🤖 ¡Hola! Soy *OHIBot*, tu asistente virtual.\n\n\
     ¿Necesitas información sobre tu cita? Escribe *Cita* para comenzar."
        .to_string()
}

pub fn doc_type_prompt() -> String {
    format!(
        "📄 Por favor, ingresa el tipo de documento a consultar: *{}*",
        document_codes()
    )
}

pub fn doc_number_prompt() -> String {
    "🔢 Ahora, por favor ingresa tu número de documento (sin puntos ni espacios):".to_string()
}

pub fn invalid_doc_type() -> String {
    format!(
        "❌ El tipo de documento ingresado no es válido. Inténtalo de nuevo ({}).",
        document_codes()
    )
}

pub fn invalid_doc_number() -> String {
    "❌ El número de documento ingresado no es válido. Inténtalo de nuevo (solo números)."
        .to_string()
}

pub fn locked_out() -> String {
    "⏳ Has excedido el número máximo de intentos. Por favor intenta nuevamente más tarde."
        .to_string()
}

pub fn lookup_failed() -> String {
    "⚠ No pude consultar tus citas en este momento. \
     Por favor envía de nuevo tu número de documento en unos minutos."
        .to_string()
}

pub fn not_found() -> String {
    "⚠ No encontré ninguna cita próxima con ese documento. \
     Si deseas intentar otra consulta, escribe: *Cita*"
        .to_string()
}

fn details(appointment: &Appointment) -> String {
    format!(
        "📝 *Documento Paciente:* {} {}\n\
         👨 *Nombre Paciente:* {}\n\
         👨‍⚕️ *Médico:* {}\n\
         🏥 *Especialidad:* {}\n\
         🗓 *Fecha:* {}",
        appointment.document_type,
        appointment.document_number,
        appointment.patient_name,
        appointment.physician_name,
        appointment.specialty,
        appointment.date,
    )
}

fn status_label(appointment: &Appointment) -> &'static str {
    match appointment.confirmation {
        Some(Confirmation::Si) => "Confirmada",
        Some(Confirmation::No) => "Cancelada",
        None => "Pendiente por confirmar",
    }
}

pub fn pending_appointment(appointment: &Appointment) -> String {
    format!(
        "📅 *Cita encontrada:*\n\n{}\n\n✅ ¿Asistirás a la cita? Responde con *si* o *no*.",
        details(appointment)
    )
}

fn option_lines(has_confirmed: bool, has_pending: bool) -> String {
    let mut lines = Vec::new();
    if has_pending {
        lines.push("✅ Escribe *confirmar* para confirmar tu cita pendiente.");
    }
    if has_confirmed {
        lines.push("🗑 Escribe *cancelar cita* para cancelar una cita confirmada.");
    }
    lines.push("🔄 Escribe *cita* para hacer otra consulta.");
    lines.join("\n")
}

pub fn appointment_list(
    appointments: &[Appointment],
    has_confirmed: bool,
    has_pending: bool,
) -> String {
    let mut text = String::from("📋 *Estas son tus citas próximas:*\n");
    for (i, appointment) in appointments.iter().enumerate() {
        let _ = write!(
            text,
            "\n*{}.*\n{}\n📌 *Asistencia:* {}\n",
            i + 1,
            details(appointment),
            status_label(appointment)
        );
    }
    text.push('\n');
    text.push_str(&option_lines(has_confirmed, has_pending));
    text
}

pub fn invalid_option(has_confirmed: bool, has_pending: bool) -> String {
    format!(
        "❌ Opción no válida.\n{}",
        option_lines(has_confirmed, has_pending)
    )
}

pub fn answer_yes_no() -> String {
    "❓ Por favor, responde con *si* o *no*.".to_string()
}

pub fn attendance_confirmed(date: &str) -> String {
    format!("✅ ¡Genial! Te esperamos el *{date}* para tu cita programada. {ANOTHER_QUERY}")
}

pub fn attendance_declined() -> String {
    format!("👍 Entendido. {ANOTHER_QUERY}")
}

pub fn confirmation_failed() -> String {
    "❌ Hubo un error al actualizar tu confirmación. Por favor intenta nuevamente más tarde."
        .to_string()
}

pub fn cancellable_list(appointments: &[Appointment]) -> String {
    let mut text = String::from("🗂 *Citas confirmadas:*\n");
    for (i, appointment) in appointments.iter().enumerate() {
        let _ = write!(
            text,
            "\n*{}.* {} - {} con {}",
            i + 1,
            appointment.date,
            appointment.specialty,
            appointment.physician_name
        );
    }
    text.push_str(
        "\n\nEscribe el número de la cita que deseas cancelar, o *terminar* para salir.",
    );
    text
}

pub fn invalid_selection(count: usize) -> String {
    format!("❌ Opción no válida. Escribe un número entre 1 y {count}, o *terminar* para salir.")
}

pub fn confirm_cancellation(appointment: &Appointment) -> String {
    format!(
        "⚠ ¿Seguro que deseas cancelar esta cita?\n\n{}\n\n\
         Responde *si* para cancelarla, *no* para conservarla o *terminar* para salir.",
        details(appointment)
    )
}

pub fn answer_cancellation() -> String {
    "❓ Responde *si* para cancelar la cita, *no* para conservarla o *terminar* para salir."
        .to_string()
}

pub fn cancellation_done(date: &str) -> String {
    format!("🗑 Tu cita del *{date}* fue cancelada. {ANOTHER_QUERY}")
}

pub fn cancellation_failed() -> String {
    "❌ No pudimos cancelar tu cita. Por favor intenta nuevamente más tarde.".to_string()
}

pub fn cancellation_kept() -> String {
    format!("👍 Tu cita se mantiene. {ANOTHER_QUERY}")
}

pub fn farewell() -> String {
    format!("👋 Gracias por comunicarte con nosotros. {ANOTHER_QUERY}")
}

pub fn flow_restarted() -> String {
    "🔄 Empecemos de nuevo. Escribe *Cita* para hacer una nueva consulta.".to_string()
}
