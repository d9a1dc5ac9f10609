use std::cell::RefCell;
use std::sync::mpsc::Sender;

use block2::{DynBlock, RcBlock};
use objc2::rc::Retained;
use objc2::runtime::{Bool, NSObject, NSObjectProtocol, ProtocolObject};
use objc2::{define_class, msg_send, DefinedClass, MainThreadMarker, MainThreadOnly};
use objc2_foundation::{NSDictionary, NSError, NSNumber, NSString};
use objc2_ui_kit::UIApplication;
use objc2_user_notifications::{
    UNAuthorizationOptions, UNMutableNotificationContent, UNNotification, UNNotificationContent,
    UNNotificationPresentationOptions, UNNotificationRequest, UNNotificationResponse,
    UNNotificationSound, UNTimeIntervalNotificationTrigger, UNUserNotificationCenter,
    UNUserNotificationCenterDelegate,
};

use crate::NotificationError;
use crate::notifications::{
    Channel, DeliveredNotification, NotificationBackend, NotificationRequest, ReceivedNotification,
    forward, next_id,
};

///userInfo key holding the payload
const PAYLOAD_KEY: &str = "data";

struct DelegateIvars {
    observer: RefCell<Option<Sender<ReceivedNotification>>>,
    last_responded: RefCell<Option<DeliveredNotification>>,
}

define_class!(
    // SAFETY: NSObject has no subclassing requirements and NotificationDelegate has no Drop impl.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "LocalNotificationsDelegate"]
    #[ivars = DelegateIvars]
    struct NotificationDelegate;

    unsafe impl NSObjectProtocol for NotificationDelegate {}

    unsafe impl UNUserNotificationCenterDelegate for NotificationDelegate {
        #[unsafe(method(userNotificationCenter:willPresentNotification:withCompletionHandler:))]
        fn will_present(
            &self,
            _center: &UNUserNotificationCenter,
            notification: &UNNotification,
            completion_handler: &DynBlock<dyn Fn(UNNotificationPresentationOptions)>,
        ) {
            if let Some(observer) = self.ivars().observer.borrow().as_ref() {
                forward(observer, received(notification));
            }
            // Show it even though the app is active.
            completion_handler.call((
                UNNotificationPresentationOptions::Banner
                    | UNNotificationPresentationOptions::List
                    | UNNotificationPresentationOptions::Badge
                    | UNNotificationPresentationOptions::Sound,
            ));
        }

        #[unsafe(method(userNotificationCenter:didReceiveNotificationResponse:withCompletionHandler:))]
        fn did_receive_response(
            &self,
            _center: &UNUserNotificationCenter,
            response: &UNNotificationResponse,
            completion_handler: &DynBlock<dyn Fn()>,
        ) {
            let notification = unsafe { response.notification() };
            *self.ivars().last_responded.borrow_mut() = Some(delivered(&notification));
            completion_handler.call(());
        }
    }
);

impl NotificationDelegate {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(DelegateIvars {
            observer: RefCell::new(None),
            last_responded: RefCell::new(None),
        });
        unsafe { msg_send![super(this), init] }
    }
}

/// UNUserNotificationCenter backed notifications.
///
/// Must be created on the main thread, and early enough that the delegate is installed before
/// launch finishes, otherwise the response that launched the app is never seen.
pub struct IosBackend {
    mtm: MainThreadMarker,
    ///The center only keeps a weak reference
    delegate: Retained<NotificationDelegate>,
}

impl IosBackend {
    pub fn new() -> Result<Self, NotificationError> {
        let mtm = MainThreadMarker::new().ok_or(NotificationError::NotMainThread)?;
        let delegate = NotificationDelegate::new(mtm);

        unsafe {
            let center = UNUserNotificationCenter::currentNotificationCenter();
            center.setDelegate(Some(ProtocolObject::from_ref(&*delegate)));

            let options = UNAuthorizationOptions::Alert
                | UNAuthorizationOptions::Sound
                | UNAuthorizationOptions::Badge;

            let block = RcBlock::new(|granted: Bool, error: *mut NSError| {
                if granted.as_bool() {
                    log::info!("notification permission granted");
                } else {
                    log::warn!("notification permission denied");
                }
                if !error.is_null() {
                    log::error!("notification authorization error");
                }
            });
            center.requestAuthorizationWithOptions_completionHandler(options, &block);
        }

        Ok(IosBackend{mtm, delegate})
    }
}

impl NotificationBackend for IosBackend {
    fn is_supported(&self) -> bool {true}

    fn register_channel(&mut self, _channel: &Channel) -> Result<(), NotificationError> {
        Ok(())
    }

    fn schedule(&mut self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let identifier = NSString::from_str(&next_id().to_string());
        unsafe {
            let content = UNMutableNotificationContent::new();
            content.setTitle(&NSString::from_str(&request.title));
            content.setBody(&NSString::from_str(&request.body));
            content.setBadge(Some(&NSNumber::new_u32(request.badge_count)));
            content.setSound(Some(&UNNotificationSound::defaultSound()));
            content.setUserInfo(&user_info(&request.payload));

            let trigger = UNTimeIntervalNotificationTrigger::triggerWithTimeInterval_repeats(
                request.fire_delay_seconds as f64,
                false,
            );

            let ns_request = UNNotificationRequest::requestWithIdentifier_content_trigger(
                &identifier,
                &content,
                Some(&trigger),
            );

            let completion = RcBlock::new(|error: *mut NSError| {
                if !error.is_null() {
                    log::error!("failed to schedule notification: {}", (*error).localizedDescription());
                }
            });
            let center = UNUserNotificationCenter::currentNotificationCenter();
            center.addNotificationRequest_withCompletionHandler(&ns_request, Some(&completion));
        }
        log::debug!("scheduled notification {} in {}s", identifier, request.fire_delay_seconds);
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), NotificationError> {
        unsafe {
            let center = UNUserNotificationCenter::currentNotificationCenter();
            center.removeAllPendingNotificationRequests();
            center.removeAllDeliveredNotifications();
        }
        Ok(())
    }

    #[allow(deprecated)]
    fn set_badge(&mut self, count: u32) -> Result<(), NotificationError> {
        unsafe {
            let app = UIApplication::sharedApplication(self.mtm);
            app.setApplicationIconBadgeNumber(count as isize);
        }
        Ok(())
    }

    fn subscribe(&mut self, observer: Sender<ReceivedNotification>) -> Result<(), NotificationError> {
        *self.delegate.ivars().observer.borrow_mut() = Some(observer);
        Ok(())
    }

    fn last_opened(&mut self) -> Result<Option<DeliveredNotification>, NotificationError> {
        Ok(self.delegate.ivars().last_responded.borrow().clone())
    }
}

fn user_info(payload: &str) -> Retained<NSDictionary> {
    let key = NSString::from_str(PAYLOAD_KEY);
    let value = NSString::from_str(payload);
    let info = NSDictionary::<NSString, NSString>::from_slices(&[&*key], &[&*value]);
    // SAFETY: NSString keys and values are valid for an untyped dictionary.
    unsafe { Retained::cast_unchecked(info) }
}

fn payload(content: &UNNotificationContent) -> String {
    let key = NSString::from_str(PAYLOAD_KEY);
    unsafe { content.userInfo().objectForKey(&key) }
        .and_then(|value| value.downcast::<NSString>().ok())
        .map(|value| value.to_string())
        .unwrap_or_default()
}

fn delivered(notification: &UNNotification) -> DeliveredNotification {
    unsafe {
        let request = notification.request();
        let content = request.content();
        DeliveredNotification {
            id: request.identifier().to_string(),
            title: content.title().to_string(),
            body: content.body().to_string(),
            badge_count: content.badge().map(|badge| badge.as_isize().max(0) as u32).unwrap_or(0),
            payload: payload(&content),
        }
    }
}

fn received(notification: &UNNotification) -> ReceivedNotification {
    unsafe {
        let request = notification.request();
        let content = request.content();
        ReceivedNotification {
            id: request.identifier().to_string(),
            channel: content.categoryIdentifier().to_string(),
            title: content.title().to_string(),
            body: content.body().to_string(),
            payload: payload(&content),
        }
    }
}
