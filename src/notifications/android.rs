use std::collections::HashSet;
use std::sync::mpsc::Sender;

use jni::objects::{GlobalRef, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};

use crate::config::AndroidConfig;
use crate::notifications::{
    Channel, DeliveredNotification, Importance, NotificationBackend, NotificationRequest,
    ReceivedNotification, forward, next_id,
};
use crate::{NotificationConfig, NotificationError};

const IMPORTANCE_HIGH: i32 = 4;
const RTC_WAKEUP: i32 = 0;
const FLAG_ACTIVITY_NEW_TASK: i32 = 0x1000_0000;
const FLAG_UPDATE_CURRENT: i32 = 0x0800_0000;
const FLAG_IMMUTABLE: i32 = 0x0400_0000;
const FLAG_NO_CREATE: i32 = 0x2000_0000;

const EXTRA_ID: &str = "notification_id";
const EXTRA_CHANNEL: &str = "notification_channel";
const EXTRA_TITLE: &str = "notification_title";
const EXTRA_BODY: &str = "notification_body";
const EXTRA_BADGE: &str = "notification_badge";
const EXTRA_PAYLOAD: &str = "notification_data";
// Read by the publisher receiver, see android/NotificationPublisher.java
const EXTRA_REQUEST_CODE: &str = "notification_request_code";
const EXTRA_NOTIFICATION: &str = "notification";

const BUILDER: &str = "android/app/Notification$Builder";
const BUILDER_CHAIN: &str = "Landroid/app/Notification$Builder;";

/// NotificationManager and AlarmManager through JNI.
///
/// Scheduled notifications are built here and handed to AlarmManager inside a broadcast intent
/// for the publisher receiver, which posts them when the alarm fires. Tapping one relaunches the
/// app with the notification fields as intent extras, which is what `last_opened` reads.
///
/// `last_opened` reads `Activity.getIntent()`. When the app is already running, the tap is
/// delivered through `onNewIntent` and `getIntent()` keeps returning the launch intent, so the
/// host activity must override `onNewIntent` and call `setIntent` with the new intent or warm
/// relaunches are never seen.
pub struct AndroidBackend {
    vm: JavaVM,
    context: GlobalRef,
    config: AndroidConfig,
    ///Request codes of alarms this process set, needed to cancel them again
    scheduled: Vec<i32>,
    ///Ids present in the tray at the last scan
    active: HashSet<String>,
    observer: Option<Sender<ReceivedNotification>>,
}

impl AndroidBackend {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let android = ndk_context::android_context();
        let vm = unsafe { JavaVM::from_raw(android.vm().cast())? };

        let context = {
            let mut env = vm.attach_current_thread()?;
            let ctx_ptr = android.context();
            if ctx_ptr.is_null() {
                return Err(NotificationError::Backend("Android context is not available".to_string()));
            }
            let context_obj = unsafe { JObject::from_raw(ctx_ptr.cast()) };
            env.new_global_ref(context_obj)?
        };

        Ok(AndroidBackend {
            vm,
            context,
            config: config.android.clone(),
            scheduled: Vec::new(),
            active: HashSet::new(),
            observer: None,
        })
    }

    /// Runs `f` inside a local reference frame so per tick calls do not pile up local refs on a
    /// thread that never returns to Java. A pending Java exception is logged and cleared.
    fn with_env<T>(
        &self,
        f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> Result<T, NotificationError>,
    ) -> Result<T, NotificationError> {
        let mut env = self.vm.attach_current_thread()?;
        let context = self.context.as_obj();
        let result = env.with_local_frame(32, |env| f(env, context));
        if env.exception_check()? {
            env.exception_describe()?;
            env.exception_clear()?;
        }
        result
    }
}

impl NotificationBackend for AndroidBackend {
    fn is_supported(&self) -> bool {true}

    fn register_channel(&mut self, channel: &Channel) -> Result<(), NotificationError> {
        self.with_env(|env, context| {
            let id = env.new_string(&channel.id)?;
            let name = env.new_string(&channel.name)?;
            let importance = match channel.importance {
                Importance::High => IMPORTANCE_HIGH,
            };
            let jchannel = env.new_object(
                "android/app/NotificationChannel",
                "(Ljava/lang/String;Ljava/lang/CharSequence;I)V",
                &[JValue::Object(&id), JValue::Object(&name), JValue::Int(importance)],
            )?;

            let description = env.new_string(&channel.description)?;
            env.call_method(&jchannel, "setDescription", "(Ljava/lang/String;)V", &[JValue::Object(&description)])?;
            env.call_method(&jchannel, "setShowBadge", "(Z)V", &[JValue::Bool(channel.shows_badge.into())])?;

            // Creating an existing id updates its name and description.
            let manager = system_service(env, context, "notification")?;
            env.call_method(
                &manager,
                "createNotificationChannel",
                "(Landroid/app/NotificationChannel;)V",
                &[JValue::Object(&jchannel)],
            )?;
            Ok(())
        })
    }

    fn schedule(&mut self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let request_code = next_id();
        let config = &self.config;
        self.with_env(|env, context| {
            let notification = build_notification(env, context, config, request, request_code)?;

            let publisher = publisher_intent(env, context, config)?;
            let code_key = env.new_string(EXTRA_REQUEST_CODE)?;
            env.call_method(
                &publisher,
                "putExtra",
                "(Ljava/lang/String;I)Landroid/content/Intent;",
                &[JValue::Object(&code_key), JValue::Int(request_code)],
            )?;
            let notification_key = env.new_string(EXTRA_NOTIFICATION)?;
            env.call_method(
                &publisher,
                "putExtra",
                "(Ljava/lang/String;Landroid/os/Parcelable;)Landroid/content/Intent;",
                &[JValue::Object(&notification_key), JValue::Object(&notification)],
            )?;

            let broadcast = pending_intent(
                env, context, "getBroadcast", request_code, &publisher, FLAG_UPDATE_CURRENT | FLAG_IMMUTABLE,
            )?;

            let now = env.call_static_method("java/lang/System", "currentTimeMillis", "()J", &[])?.j()?;
            let fire_at = now.saturating_add(request.fire_delay_seconds.saturating_mul(1000));

            let alarm = system_service(env, context, "alarm")?;
            env.call_method(
                &alarm,
                "set",
                "(IJLandroid/app/PendingIntent;)V",
                &[JValue::Int(RTC_WAKEUP), JValue::Long(fire_at), JValue::Object(&broadcast)],
            )?;
            Ok(())
        })?;

        self.scheduled.push(request_code);
        log::debug!("scheduled notification {} in {}s", request_code, request.fire_delay_seconds);
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), NotificationError> {
        let config = &self.config;
        let scheduled = &self.scheduled;
        self.with_env(|env, context| {
            let alarm = system_service(env, context, "alarm")?;
            for request_code in scheduled {
                let publisher = publisher_intent(env, context, config)?;
                let broadcast = pending_intent(
                    env, context, "getBroadcast", *request_code, &publisher, FLAG_NO_CREATE | FLAG_IMMUTABLE,
                )?;
                // Null when the alarm already fired.
                if !broadcast.is_null() {
                    env.call_method(&alarm, "cancel", "(Landroid/app/PendingIntent;)V", &[JValue::Object(&broadcast)])?;
                    env.call_method(&broadcast, "cancel", "()V", &[])?;
                }
                env.delete_local_ref(publisher)?;
                env.delete_local_ref(broadcast)?;
            }

            let manager = system_service(env, context, "notification")?;
            env.call_method(&manager, "cancelAll", "()V", &[])?;
            Ok(())
        })?;
        self.scheduled.clear();
        self.active.clear();
        Ok(())
    }

    fn set_badge(&mut self, _count: u32) -> Result<(), NotificationError> {
        // Launchers derive the badge from the notification number.
        Ok(())
    }

    fn subscribe(&mut self, observer: Sender<ReceivedNotification>) -> Result<(), NotificationError> {
        // Whatever is already in the tray arrived before we were listening.
        self.active = self.with_env(active_notifications)?.into_iter().map(|n| n.id).collect();
        self.observer = Some(observer);
        Ok(())
    }

    fn poll_received(&mut self) -> Result<(), NotificationError> {
        let Some(observer) = &self.observer else {return Ok(())};
        let current = self.with_env(active_notifications)?;

        for received in current.iter().filter(|n| !self.active.contains(&n.id)) {
            forward(observer, received.clone());
        }
        self.active = current.into_iter().map(|n| n.id).collect();
        Ok(())
    }

    fn last_opened(&mut self) -> Result<Option<DeliveredNotification>, NotificationError> {
        self.with_env(|env, context| {
            if !env.is_instance_of(context, "android/app/Activity")? {
                return Ok(None);
            }
            let intent = env.call_method(context, "getIntent", "()Landroid/content/Intent;", &[])?.l()?;
            if intent.is_null() {
                return Ok(None);
            }

            let Some(id) = string_extra(env, &intent, EXTRA_ID)? else {return Ok(None)};
            let badge_key = env.new_string(EXTRA_BADGE)?;
            let badge = env.call_method(
                &intent,
                "getIntExtra",
                "(Ljava/lang/String;I)I",
                &[JValue::Object(&badge_key), JValue::Int(0)],
            )?.i()?;

            Ok(Some(DeliveredNotification {
                id,
                title: string_extra(env, &intent, EXTRA_TITLE)?.unwrap_or_default(),
                body: string_extra(env, &intent, EXTRA_BODY)?.unwrap_or_default(),
                badge_count: badge.max(0) as u32,
                payload: string_extra(env, &intent, EXTRA_PAYLOAD)?.unwrap_or_default(),
            }))
        })
    }
}

fn build_notification<'a>(
    env: &mut JNIEnv<'a>,
    context: &JObject,
    config: &AndroidConfig,
    request: &NotificationRequest,
    request_code: i32,
) -> Result<JObject<'a>, NotificationError> {
    let channel_id = env.new_string(&request.channel_id)?;
    let builder = env.new_object(
        BUILDER,
        "(Landroid/content/Context;Ljava/lang/String;)V",
        &[JValue::Object(context), JValue::Object(&channel_id)],
    )?;

    let title = env.new_string(&request.title)?;
    builder_call(env, &builder, "setContentTitle", "Ljava/lang/CharSequence;", JValue::Object(&title))?;
    let body = env.new_string(&request.body)?;
    builder_call(env, &builder, "setContentText", "Ljava/lang/CharSequence;", JValue::Object(&body))?;
    let badge = i32::try_from(request.badge_count).unwrap_or(i32::MAX);
    builder_call(env, &builder, "setNumber", "I", JValue::Int(badge))?;
    builder_call(env, &builder, "setAutoCancel", "Z", JValue::Bool(1))?;

    let small_icon = match drawable_id(env, context, &config.small_icon)? {
        0 => {
            let info = env.call_method(context, "getApplicationInfo", "()Landroid/content/pm/ApplicationInfo;", &[])?.l()?;
            env.get_field(&info, "icon", "I")?.i()?
        }
        id => id,
    };
    builder_call(env, &builder, "setSmallIcon", "I", JValue::Int(small_icon))?;

    let large_icon = drawable_id(env, context, &config.large_icon)?;
    if large_icon != 0 {
        let resources = env.call_method(context, "getResources", "()Landroid/content/res/Resources;", &[])?.l()?;
        let bitmap = env.call_static_method(
            "android/graphics/BitmapFactory",
            "decodeResource",
            "(Landroid/content/res/Resources;I)Landroid/graphics/Bitmap;",
            &[JValue::Object(&resources), JValue::Int(large_icon)],
        )?.l()?;
        if !bitmap.is_null() {
            builder_call(env, &builder, "setLargeIcon", "Landroid/graphics/Bitmap;", JValue::Object(&bitmap))?;
        }
    }

    let id = request_code.to_string();
    let extras = env.new_object("android/os/Bundle", "()V", &[])?;
    put_bundle_string(env, &extras, EXTRA_ID, &id)?;
    put_bundle_string(env, &extras, EXTRA_PAYLOAD, &request.payload)?;
    builder_call(env, &builder, "addExtras", "Landroid/os/Bundle;", JValue::Object(&extras))?;

    let launch = launch_intent(env, context)?;
    put_intent_string(env, &launch, EXTRA_ID, &id)?;
    put_intent_string(env, &launch, EXTRA_CHANNEL, &request.channel_id)?;
    put_intent_string(env, &launch, EXTRA_TITLE, &request.title)?;
    put_intent_string(env, &launch, EXTRA_BODY, &request.body)?;
    put_intent_string(env, &launch, EXTRA_PAYLOAD, &request.payload)?;
    let badge_key = env.new_string(EXTRA_BADGE)?;
    env.call_method(
        &launch,
        "putExtra",
        "(Ljava/lang/String;I)Landroid/content/Intent;",
        &[JValue::Object(&badge_key), JValue::Int(badge)],
    )?;
    let content = pending_intent(env, context, "getActivity", request_code, &launch, FLAG_UPDATE_CURRENT | FLAG_IMMUTABLE)?;
    builder_call(env, &builder, "setContentIntent", "Landroid/app/PendingIntent;", JValue::Object(&content))?;

    Ok(env.call_method(&builder, "build", "()Landroid/app/Notification;", &[])?.l()?)
}

/// Notifications of ours currently in the tray.
fn active_notifications(env: &mut JNIEnv, context: &JObject) -> Result<Vec<ReceivedNotification>, NotificationError> {
    let manager = system_service(env, context, "notification")?;
    let array = env.call_method(
        &manager,
        "getActiveNotifications",
        "()[Landroid/service/notification/StatusBarNotification;",
        &[],
    )?.l()?;
    if array.is_null() {
        return Ok(Vec::new());
    }
    let array = JObjectArray::from(array);

    let mut found = Vec::new();
    for index in 0..env.get_array_length(&array)? {
        let status = env.get_object_array_element(&array, index)?;
        let notification = env.call_method(&status, "getNotification", "()Landroid/app/Notification;", &[])?.l()?;
        let extras = env.get_field(&notification, "extras", "Landroid/os/Bundle;")?.l()?;

        if let Some(id) = bundle_string(env, &extras, EXTRA_ID)? {
            let channel = env.call_method(&notification, "getChannelId", "()Ljava/lang/String;", &[])?.l()?;
            found.push(ReceivedNotification {
                id,
                channel: java_string(env, channel)?.unwrap_or_default(),
                title: bundle_text(env, &extras, "android.title")?.unwrap_or_default(),
                body: bundle_text(env, &extras, "android.text")?.unwrap_or_default(),
                payload: bundle_string(env, &extras, EXTRA_PAYLOAD)?.unwrap_or_default(),
            });
        }

        env.delete_local_ref(extras)?;
        env.delete_local_ref(notification)?;
        env.delete_local_ref(status)?;
    }
    Ok(found)
}

fn builder_call(env: &mut JNIEnv, builder: &JObject, name: &str, arg_sig: &str, arg: JValue) -> Result<(), NotificationError> {
    let sig = format!("({}){}", arg_sig, BUILDER_CHAIN);
    let returned = env.call_method(builder, name, sig, &[arg])?.l()?;
    env.delete_local_ref(returned)?;
    Ok(())
}

fn system_service<'a>(env: &mut JNIEnv<'a>, context: &JObject, name: &str) -> Result<JObject<'a>, NotificationError> {
    let name = env.new_string(name)?;
    let service = env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&name)],
    )?.l()?;
    if service.is_null() {
        return Err(NotificationError::Backend("system service unavailable".to_string()));
    }
    Ok(service)
}

fn package_name(env: &mut JNIEnv, context: &JObject) -> Result<String, NotificationError> {
    let name = env.call_method(context, "getPackageName", "()Ljava/lang/String;", &[])?.l()?;
    java_string(env, name)?.ok_or_else(|| NotificationError::Backend("package name unavailable".to_string()))
}

/// Resource id of a drawable by name, 0 when the app has none.
fn drawable_id(env: &mut JNIEnv, context: &JObject, name: &str) -> Result<i32, NotificationError> {
    if name.is_empty() {
        return Ok(0);
    }
    let resources = env.call_method(context, "getResources", "()Landroid/content/res/Resources;", &[])?.l()?;
    let name = env.new_string(name)?;
    let kind = env.new_string("drawable")?;
    let package = package_name(env, context)?;
    let package = env.new_string(package)?;
    Ok(env.call_method(
        &resources,
        "getIdentifier",
        "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)I",
        &[JValue::Object(&name), JValue::Object(&kind), JValue::Object(&package)],
    )?.i()?)
}

fn launch_intent<'a>(env: &mut JNIEnv<'a>, context: &JObject) -> Result<JObject<'a>, NotificationError> {
    let package_manager = env.call_method(context, "getPackageManager", "()Landroid/content/pm/PackageManager;", &[])?.l()?;
    let package = package_name(env, context)?;
    let package = env.new_string(package)?;
    let intent = env.call_method(
        &package_manager,
        "getLaunchIntentForPackage",
        "(Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&package)],
    )?.l()?;
    if intent.is_null() {
        return Err(NotificationError::Backend("no launch activity".to_string()));
    }
    env.call_method(&intent, "addFlags", "(I)Landroid/content/Intent;", &[JValue::Int(FLAG_ACTIVITY_NEW_TASK)])?;
    Ok(intent)
}

/// Explicit intent for the publisher receiver. Extras are not part of PendingIntent matching, so
/// a bare one is enough to look an alarm up again.
fn publisher_intent<'a>(env: &mut JNIEnv<'a>, context: &JObject, config: &AndroidConfig) -> Result<JObject<'a>, NotificationError> {
    let intent = env.new_object("android/content/Intent", "()V", &[])?;
    let class = env.new_string(&config.publisher_class)?;
    env.call_method(
        &intent,
        "setClassName",
        "(Landroid/content/Context;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(context), JValue::Object(&class)],
    )?;
    Ok(intent)
}

fn pending_intent<'a>(
    env: &mut JNIEnv<'a>,
    context: &JObject,
    factory: &str,
    request_code: i32,
    intent: &JObject,
    flags: i32,
) -> Result<JObject<'a>, NotificationError> {
    Ok(env.call_static_method(
        "android/app/PendingIntent",
        factory,
        "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
        &[JValue::Object(context), JValue::Int(request_code), JValue::Object(intent), JValue::Int(flags)],
    )?.l()?)
}

fn put_intent_string(env: &mut JNIEnv, intent: &JObject, key: &str, value: &str) -> Result<(), NotificationError> {
    let key = env.new_string(key)?;
    let value = env.new_string(value)?;
    env.call_method(
        intent,
        "putExtra",
        "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&key), JValue::Object(&value)],
    )?;
    Ok(())
}

fn put_bundle_string(env: &mut JNIEnv, bundle: &JObject, key: &str, value: &str) -> Result<(), NotificationError> {
    let key = env.new_string(key)?;
    let value = env.new_string(value)?;
    env.call_method(bundle, "putString", "(Ljava/lang/String;Ljava/lang/String;)V", &[JValue::Object(&key), JValue::Object(&value)])?;
    Ok(())
}

fn string_extra(env: &mut JNIEnv, intent: &JObject, key: &str) -> Result<Option<String>, NotificationError> {
    let key = env.new_string(key)?;
    let value = env.call_method(intent, "getStringExtra", "(Ljava/lang/String;)Ljava/lang/String;", &[JValue::Object(&key)])?.l()?;
    java_string(env, value)
}

fn bundle_string(env: &mut JNIEnv, bundle: &JObject, key: &str) -> Result<Option<String>, NotificationError> {
    if bundle.is_null() {
        return Ok(None);
    }
    let key = env.new_string(key)?;
    let value = env.call_method(bundle, "getString", "(Ljava/lang/String;)Ljava/lang/String;", &[JValue::Object(&key)])?.l()?;
    java_string(env, value)
}

fn bundle_text(env: &mut JNIEnv, bundle: &JObject, key: &str) -> Result<Option<String>, NotificationError> {
    if bundle.is_null() {
        return Ok(None);
    }
    let key = env.new_string(key)?;
    let value = env.call_method(bundle, "getCharSequence", "(Ljava/lang/String;)Ljava/lang/CharSequence;", &[JValue::Object(&key)])?.l()?;
    if value.is_null() {
        return Ok(None);
    }
    let value = env.call_method(&value, "toString", "()Ljava/lang/String;", &[])?.l()?;
    java_string(env, value)
}

fn java_string(env: &mut JNIEnv, value: JObject) -> Result<Option<String>, NotificationError> {
    if value.is_null() {
        return Ok(None);
    }
    let value = JString::from(value);
    let text: String = env.get_string(&value)?.into();
    env.delete_local_ref(value)?;
    Ok(Some(text))
}
